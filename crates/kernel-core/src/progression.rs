//! XP arithmetic: level-ups, grade promotions, and the terminal ceiling.

use contracts::{Grade, Progress};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    LevelUp { level: u32, grade_index: usize },
    Promotion { grade_index: usize, grade_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XpOutcome {
    pub progress: Progress,
    pub events: Vec<ProgressEvent>,
}

impl XpOutcome {
    pub fn levels_gained(&self) -> usize {
        self.events
            .iter()
            .filter(|event| matches!(event, ProgressEvent::LevelUp { .. }))
            .count()
    }
}

/// Adds `delta` XP and walks the grade ladder. At the last level of the last grade
/// the level is clamped to the cap and xp is pinned at that grade's threshold.
pub fn apply_xp(progress: Progress, delta: u64, grades: &[Grade]) -> XpOutcome {
    if delta == 0 {
        return XpOutcome {
            progress,
            events: Vec::new(),
        };
    }

    let mut xp = progress.xp.saturating_add(delta);
    let mut level = progress.level;
    let mut grade_index = progress.grade_index;
    let mut events = Vec::new();

    while let Some(grade) = grades.get(grade_index) {
        let threshold = grade.xp_per_level;
        if threshold == 0 || xp < threshold {
            break;
        }

        xp -= threshold;
        let previous_level = level;
        level += 1;

        if level > grade.levels_to_complete {
            if grade_index + 1 < grades.len() {
                grade_index += 1;
                level = 1;
                events.push(ProgressEvent::Promotion {
                    grade_index,
                    grade_name: grades[grade_index].name.clone(),
                });
            } else {
                level = grade.levels_to_complete;
                xp = threshold;
                if previous_level != level {
                    events.push(ProgressEvent::LevelUp { level, grade_index });
                }
                break;
            }
        }

        if previous_level != level {
            events.push(ProgressEvent::LevelUp { level, grade_index });
        }
    }

    XpOutcome {
        progress: Progress {
            xp,
            level,
            grade_index,
        },
        events,
    }
}

pub fn is_at_ceiling(progress: &Progress, grades: &[Grade]) -> bool {
    match grades.last() {
        Some(last) => {
            progress.grade_index + 1 == grades.len() && progress.level >= last.levels_to_complete
        }
        None => true,
    }
}

/// XP still needed for the next level, or zero at the ceiling.
pub fn xp_to_next_level(progress: &Progress, grades: &[Grade]) -> u64 {
    if is_at_ceiling(progress, grades) {
        return 0;
    }
    grades
        .get(progress.grade_index)
        .map(|grade| grade.xp_per_level.saturating_sub(progress.xp))
        .unwrap_or(0)
}
