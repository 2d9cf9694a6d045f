//! Built-in content used when no catalog has been persisted.

use contracts::{
    Achievement, Catalogs, Chapter, DailyMission, DailyTrigger, Grade, Mission, Quiz,
    QuizQuestion, RulePredicate, ShopItem, ShopItemType,
};

pub fn default_catalogs() -> Catalogs {
    Catalogs {
        grades: default_grades(),
        achievements: default_achievements(),
        missions: default_missions(),
        daily_missions: default_daily_missions(),
        shop_items: default_shop_items(),
        chapters: default_chapters(),
        quizzes: default_quizzes(),
    }
}

fn grade(name: &str, icon: &str, levels_to_complete: u32, xp_per_level: u64) -> Grade {
    Grade {
        name: name.to_string(),
        icon: icon.to_string(),
        levels_to_complete,
        xp_per_level,
    }
}

pub fn default_grades() -> Vec<Grade> {
    vec![
        grade("Novice", "📚", 10, 100),
        grade("Calculateur", "✏️", 20, 150),
        grade("Algébriste", "📊", 35, 200),
        grade("Géomètre", "📐", 50, 250),
        grade("Analyste", "📈", 70, 300),
        grade("Mathématicien", "🧮", 100, 400),
        grade("Professeur", "🎓", 120, 500),
        grade("GOAT", "👑", 200, 1000),
    ]
}

fn achievement(id: &str, icon: &str, title: &str, description: &str, rule: RulePredicate) -> Achievement {
    Achievement {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        secret: false,
        rule,
    }
}

fn default_achievements() -> Vec<Achievement> {
    let mut secret_goat = achievement(
        "ach_secret_goat",
        "👑",
        "Le GOAT ?",
        "???",
        RulePredicate::LevelAtLeast { level: 50 },
    );
    secret_goat.secret = true;

    vec![
        achievement("ach_level_5", "🎉", "Bien parti", "Atteindre le niveau 5", RulePredicate::LevelAtLeast { level: 5 }),
        achievement("ach_level_10", "🚀", "Apprenti", "Atteindre le niveau 10", RulePredicate::LevelAtLeast { level: 10 }),
        achievement("ach_level_25", "🌟", "Expérimenté", "Atteindre le niveau 25", RulePredicate::LevelAtLeast { level: 25 }),
        achievement("ach_first_perfect", "⭐", "Perfectionniste", "Obtenir un score parfait à un quiz", RulePredicate::PerfectQuizzesAtLeast { count: 1 }),
        achievement("ach_5_perfect", "🏆", "Maître des Quiz", "Obtenir 5 scores parfaits", RulePredicate::PerfectQuizzesAtLeast { count: 5 }),
        achievement("ach_first_duel_win", "⚔️", "Duelliste", "Gagner son premier duel", RulePredicate::DuelWinsAtLeast { count: 1 }),
        achievement("ach_10_duel_wins", "👑", "Roi du Duel", "Gagner 10 duels", RulePredicate::DuelWinsAtLeast { count: 10 }),
        achievement("ach_first_purchase", "🛍️", "Shopping", "Acheter son premier article", RulePredicate::ItemsOwnedAtLeast { count: 1 }),
        achievement(
            "ach_5_avatars",
            "🎭",
            "Collectionneur",
            "Posséder 5 avatars",
            RulePredicate::OwnsItemTypeAtLeast {
                item_type: ShopItemType::Avatar,
                count: 5,
            },
        ),
        achievement("ach_all_chapters", "🎓", "Savant", "Consulter tous les chapitres disponibles", RulePredicate::AllChaptersConsulted),
        achievement("ach_join_guild", "🏰", "Fraternité", "Rejoindre ou créer une guilde", RulePredicate::InGuild),
        secret_goat,
    ]
}

fn mission(id: &str, title: &str, reward_xp: u64, reward_coins: u64, rule: RulePredicate) -> Mission {
    Mission {
        id: id.to_string(),
        title: title.to_string(),
        description: title.to_string(),
        reward_xp,
        reward_coins,
        rule,
    }
}

fn default_missions() -> Vec<Mission> {
    vec![
        mission("mission1", "Reach Level 2", 50, 10, RulePredicate::LevelAtLeast { level: 2 }),
        mission("mission2", "Complete 3 Chapters", 100, 25, RulePredicate::ChaptersConsultedAtLeast { count: 3 }),
        mission("mission3", "First Purchase", 20, 5, RulePredicate::ItemsOwnedAtLeast { count: 1 }),
        mission("mission4", "Reach Level 5", 200, 50, RulePredicate::LevelAtLeast { level: 5 }),
    ]
}

fn daily(id: &str, title: &str, reward_xp: u64, reward_coins: u64, trigger: DailyTrigger) -> DailyMission {
    DailyMission {
        id: id.to_string(),
        title: title.to_string(),
        reward_xp,
        reward_coins,
        trigger,
    }
}

fn default_daily_missions() -> Vec<DailyMission> {
    vec![
        daily("daily1", "Première connexion", 10, 10, DailyTrigger::Login),
        daily("daily2", "Étudiant assidu", 20, 10, DailyTrigger::ChapterConsulted),
        daily("daily3", "Quiz master", 50, 20, DailyTrigger::QuizCompleted),
        daily("daily4", "Perfectionniste", 100, 50, DailyTrigger::QuizPerfect),
        daily("daily5", "Régularité", 30, 15, DailyTrigger::Manual),
    ]
}

fn item(id: &str, name: &str, item_type: ShopItemType, price: u64) -> ShopItem {
    ShopItem {
        id: id.to_string(),
        name: name.to_string(),
        item_type,
        price,
        theme_id: None,
        purchasable: true,
    }
}

fn theme(id: &str, name: &str, price: u64, theme_id: &str) -> ShopItem {
    ShopItem {
        theme_id: Some(theme_id.to_string()),
        ..item(id, name, ShopItemType::Theme, price)
    }
}

fn default_shop_items() -> Vec<ShopItem> {
    vec![
        item("item1", "Avatar Einstein", ShopItemType::Avatar, 100),
        item("item2", "Avatar Newton", ShopItemType::Avatar, 100),
        item("item3", "Avatar Pythagore", ShopItemType::Avatar, 150),
        item("item4", "Double XP 24h", ShopItemType::Boost, 200),
        item("item5", "Bouclier 3 jours", ShopItemType::Boost, 150),
        theme("item12", "Thème Arc-en-ciel", 350, "theme_rainbow"),
        theme("item13", "Thème Synthwave", 400, "theme_synthwave"),
        theme("item14", "Thème Jungle", 300, "theme_jungle"),
        theme("item15", "Thème Shinobi", 450, "theme_shinobi"),
        item("banner1", "Bannière Galaxie", ShopItemType::ProfileBanner, 500),
        item("banner2", "Bannière Forêt", ShopItemType::ProfileBanner, 400),
        item("frame1", "Cadre Doré", ShopItemType::AvatarFrame, 750),
        item("frame2", "Cadre Flamboyant", ShopItemType::AvatarFrame, 600),
        ShopItem {
            purchasable: false,
            ..item("reward_algebra_king", "Couronne Algébrique", ShopItemType::Avatar, 0)
        },
    ]
}

fn chapter(id: &str, title: &str, reward_xp: u64) -> Chapter {
    Chapter {
        id: id.to_string(),
        title: title.to_string(),
        reward_xp,
        reward_coins: 10,
    }
}

fn default_chapters() -> Vec<Chapter> {
    vec![
        chapter("chap1", "Algèbre - Niveau 1", 20),
        chapter("chap2", "Géométrie - Niveau 1", 25),
        chapter("chap3", "Fonctions affines", 35),
        chapter("chap4", "Probabilités", 30),
        chapter("chap5", "Trigonométrie", 50),
        chapter("chap6", "Équations 2nd degré", 45),
    ]
}

fn question(id: &str, prompt: &str, options: [&str; 4], answer_index: usize) -> QuizQuestion {
    QuizQuestion {
        id: id.to_string(),
        prompt: prompt.to_string(),
        options: options.iter().map(|option| option.to_string()).collect(),
        answer_index,
    }
}

fn default_quizzes() -> Vec<Quiz> {
    vec![
        Quiz {
            id: "quiz1".to_string(),
            chapter_id: "chap1".to_string(),
            title: "Quiz sur les équations du premier degré".to_string(),
            questions: vec![
                question("q1_1", "Résous : 2x + 5 = 15", ["x = 5", "x = 10", "x = 2.5", "x = 7.5"], 0),
                question("q1_2", "Si 3y - 4 = 11, que vaut y ?", ["y = 3", "y = 4", "y = 5", "y = 15"], 2),
                question("q1_3", "Quelle est la valeur de z si 10 - z = 4 ?", ["z = 14", "z = 6", "z = -6", "z = 4"], 1),
            ],
        },
        Quiz {
            id: "quiz2".to_string(),
            chapter_id: "chap2".to_string(),
            title: "Quiz sur les triangles et angles".to_string(),
            questions: vec![
                question("q2_1", "La somme des angles d'un triangle est toujours de :", ["90°", "180°", "270°", "360°"], 1),
                question("q2_2", "Comment appelle-t-on un triangle avec 3 côtés égaux ?", ["Isocèle", "Scalène", "Rectangle", "Équilatéral"], 3),
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_ladder_has_eight_grades() {
        let catalogs = default_catalogs();
        assert_eq!(catalogs.grades.len(), 8);
        assert_eq!(catalogs.grades[0].xp_per_level, 100);
        assert_eq!(catalogs.grades[7].levels_to_complete, 200);
    }

    #[test]
    fn reward_items_are_not_for_sale() {
        let catalogs = default_catalogs();
        let crown = catalogs
            .shop_item("reward_algebra_king")
            .expect("reward item exists");
        assert!(!crown.purchasable);
        assert!(catalogs.shop_item("item13").and_then(|item| item.theme_id.as_deref()) == Some("theme_synthwave"));
    }

    #[test]
    fn questions_carry_their_chapter() {
        let catalogs = default_catalogs();
        let chapters = catalogs
            .questions()
            .map(|(chapter_id, question)| (chapter_id.to_string(), question.id.clone()))
            .collect::<Vec<_>>();
        assert_eq!(chapters.len(), 5);
        assert_eq!(chapters[3], ("chap2".to_string(), "q2_1".to_string()));
    }
}
