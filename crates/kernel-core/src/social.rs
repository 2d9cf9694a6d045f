//! Social state machines: friend requests, duel challenges, and private messages.

use std::collections::BTreeMap;

use contracts::{
    Account, ActiveDuel, DuelChallenge, FriendRelation, FriendRequest, PrivateMessage,
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ---------------------------------------------------------------------------
// FriendBook
// ---------------------------------------------------------------------------

/// Pending friend requests keyed by request id. Accepted friendships live on the
/// accounts themselves (symmetric `friend_ids`).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FriendBook {
    requests: BTreeMap<String, FriendRequest>,
}

impl FriendBook {
    pub fn get(&self, request_id: &str) -> Option<&FriendRequest> {
        self.requests.get(request_id)
    }

    /// A pending request between `a` and `b`, in either direction.
    pub fn pending_between(&self, a: &str, b: &str) -> Option<&FriendRequest> {
        self.requests.values().find(|request| {
            (request.from_account_id == a && request.to_account_id == b)
                || (request.from_account_id == b && request.to_account_id == a)
        })
    }

    /// Relation of `account` towards `other_id`, seen from `account`.
    pub fn relation(&self, account: &Account, other_id: &str) -> FriendRelation {
        if account.friend_ids.contains(other_id) {
            return FriendRelation::Friends;
        }
        match self.pending_between(&account.account_id, other_id) {
            Some(request) if request.from_account_id == account.account_id => {
                FriendRelation::RequestSent
            }
            Some(_) => FriendRelation::RequestReceived,
            None => FriendRelation::None,
        }
    }

    pub fn validate_send(&self, from: &Account, to_id: &str) -> EngineResult<()> {
        if from.account_id == to_id {
            return Err(EngineError::InvalidTarget(
                "cannot send a friend request to yourself".to_string(),
            ));
        }
        if self.relation(from, to_id) != FriendRelation::None {
            return Err(EngineError::DuplicateRequest {
                from: from.account_id.clone(),
                to: to_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn insert(&mut self, request: FriendRequest) {
        self.requests.insert(request.request_id.clone(), request);
    }

    /// Removes and returns a request. Each request resolves exactly once.
    pub fn take(&mut self, request_id: &str) -> EngineResult<FriendRequest> {
        self.requests
            .remove(request_id)
            .ok_or_else(|| EngineError::not_found("friend request", request_id))
    }

    pub fn incoming<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a FriendRequest> {
        self.requests
            .values()
            .filter(move |request| request.to_account_id == account_id)
    }

    pub fn outgoing<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a FriendRequest> {
        self.requests
            .values()
            .filter(move |request| request.from_account_id == account_id)
    }

    /// Drops every request touching `account_id`. Returns how many were removed.
    pub fn forget_account(&mut self, account_id: &str) -> usize {
        let before = self.requests.len();
        self.requests.retain(|_, request| {
            request.from_account_id != account_id && request.to_account_id != account_id
        });
        before - self.requests.len()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

pub fn befriend(a: &mut Account, b: &mut Account) {
    a.friend_ids.insert(b.account_id.clone());
    b.friend_ids.insert(a.account_id.clone());
}

pub fn unfriend(a: &mut Account, b: &mut Account) {
    a.friend_ids.remove(&b.account_id);
    b.friend_ids.remove(&a.account_id);
}

// ---------------------------------------------------------------------------
// DuelBoard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DuelVerdict {
    Winner { winner_id: String, loser_id: String },
    Tie,
}

/// Pending challenges and accepted duels awaiting a result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelBoard {
    challenges: BTreeMap<String, DuelChallenge>,
    active: BTreeMap<String, ActiveDuel>,
}

impl DuelBoard {
    pub fn validate_send(&self, from: &Account, to_id: &str) -> EngineResult<()> {
        if from.account_id == to_id {
            return Err(EngineError::InvalidTarget(
                "cannot challenge yourself".to_string(),
            ));
        }
        let already_pending = self.challenges.values().any(|challenge| {
            challenge.from_account_id == from.account_id && challenge.to_account_id == to_id
        });
        if already_pending {
            return Err(EngineError::DuplicateRequest {
                from: from.account_id.clone(),
                to: to_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn challenge(&self, challenge_id: &str) -> EngineResult<&DuelChallenge> {
        self.challenges
            .get(challenge_id)
            .ok_or_else(|| EngineError::not_found("duel challenge", challenge_id))
    }

    pub fn insert_challenge(&mut self, challenge: DuelChallenge) {
        self.challenges
            .insert(challenge.challenge_id.clone(), challenge);
    }

    pub fn take_challenge(&mut self, challenge_id: &str) -> EngineResult<DuelChallenge> {
        self.challenges
            .remove(challenge_id)
            .ok_or_else(|| EngineError::not_found("duel challenge", challenge_id))
    }

    pub fn duel(&self, duel_id: &str) -> EngineResult<&ActiveDuel> {
        self.active
            .get(duel_id)
            .ok_or_else(|| EngineError::not_found("duel", duel_id))
    }

    pub fn insert_duel(&mut self, duel: ActiveDuel) {
        self.active.insert(duel.duel_id.clone(), duel);
    }

    pub fn take_duel(&mut self, duel_id: &str) -> EngineResult<ActiveDuel> {
        self.active
            .remove(duel_id)
            .ok_or_else(|| EngineError::not_found("duel", duel_id))
    }

    pub fn challenges_for<'a>(
        &'a self,
        account_id: &'a str,
    ) -> impl Iterator<Item = &'a DuelChallenge> {
        self.challenges.values().filter(move |challenge| {
            challenge.from_account_id == account_id || challenge.to_account_id == account_id
        })
    }

    pub fn duels_for<'a>(&'a self, account_id: &'a str) -> impl Iterator<Item = &'a ActiveDuel> {
        self.active
            .values()
            .filter(move |duel| duel.challenger_id == account_id || duel.opponent_id == account_id)
    }

    /// Removes challenges and duels involving `account_id` and returns them so the
    /// caller can refund escrowed wagers.
    pub fn forget_account(&mut self, account_id: &str) -> (Vec<DuelChallenge>, Vec<ActiveDuel>) {
        let challenge_ids = self
            .challenges_for(account_id)
            .map(|challenge| challenge.challenge_id.clone())
            .collect::<Vec<_>>();
        let duel_ids = self
            .duels_for(account_id)
            .map(|duel| duel.duel_id.clone())
            .collect::<Vec<_>>();

        let challenges = challenge_ids
            .iter()
            .filter_map(|id| self.challenges.remove(id))
            .collect();
        let duels = duel_ids
            .iter()
            .filter_map(|id| self.active.remove(id))
            .collect();
        (challenges, duels)
    }

    pub fn pending_count(&self) -> usize {
        self.challenges.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

pub fn judge(duel: &ActiveDuel, challenger_score: u32, opponent_score: u32) -> DuelVerdict {
    match challenger_score.cmp(&opponent_score) {
        std::cmp::Ordering::Greater => DuelVerdict::Winner {
            winner_id: duel.challenger_id.clone(),
            loser_id: duel.opponent_id.clone(),
        },
        std::cmp::Ordering::Less => DuelVerdict::Winner {
            winner_id: duel.opponent_id.clone(),
            loser_id: duel.challenger_id.clone(),
        },
        std::cmp::Ordering::Equal => DuelVerdict::Tie,
    }
}

// ---------------------------------------------------------------------------
// MessageBoard
// ---------------------------------------------------------------------------

/// Private conversations keyed by the unordered pair of participants.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageBoard {
    threads: BTreeMap<String, Vec<PrivateMessage>>,
}

fn thread_key(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}|{b}")
    } else {
        format!("{b}|{a}")
    }
}

impl MessageBoard {
    pub fn post(&mut self, message: PrivateMessage) {
        self.threads
            .entry(thread_key(&message.from_account_id, &message.to_account_id))
            .or_default()
            .push(message);
    }

    pub fn thread(&self, a: &str, b: &str) -> &[PrivateMessage] {
        self.threads
            .get(&thread_key(a, b))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Marks every message addressed to `reader` from `other` as read.
    pub fn mark_read(&mut self, reader: &str, other: &str) -> usize {
        let Some(thread) = self.threads.get_mut(&thread_key(reader, other)) else {
            return 0;
        };
        let mut marked = 0;
        for message in thread.iter_mut() {
            if message.to_account_id == reader && !message.read {
                message.read = true;
                marked += 1;
            }
        }
        marked
    }

    pub fn forget_account(&mut self, account_id: &str) {
        self.threads.retain(|key, _| {
            key.split('|').all(|participant| participant != account_id)
        });
    }
}
