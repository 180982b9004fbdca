//! In-memory room registry.
//!
//! One mutex guards the whole map and every mutation is a single critical
//! section, so concurrent joins and leaves can never leave a count that
//! disagrees with the membership set. Empty rooms are removed eagerly.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::chat::RoomActivity;
use crate::domain::foundation::{RoomId, Username};
use crate::ports::{RegistryError, RoomRegistry};

/// Single-process registry of room members.
#[derive(Debug, Default)]
pub struct InMemoryRoomRegistry {
    rooms: Mutex<HashMap<RoomId, BTreeSet<Username>>>,
}

impl InMemoryRoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomRegistry for InMemoryRoomRegistry {
    async fn join(&self, room: &RoomId, user: &Username) -> Result<usize, RegistryError> {
        let mut rooms = self.rooms.lock().await;
        let members = rooms.entry(room.clone()).or_default();

        if !members.insert(user.clone()) {
            return Err(RegistryError::AlreadyJoined {
                room: room.clone(),
                user: user.clone(),
            });
        }

        Ok(members.len())
    }

    async fn leave(&self, room: &RoomId, user: &Username) -> Result<bool, RegistryError> {
        let mut rooms = self.rooms.lock().await;
        let Some(members) = rooms.get_mut(room) else {
            return Ok(false);
        };

        let removed = members.remove(user);
        if members.is_empty() {
            rooms.remove(room);
        }

        Ok(removed)
    }

    async fn members(&self, room: &RoomId) -> Result<Vec<Username>, RegistryError> {
        Ok(self
            .rooms
            .lock()
            .await
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn active_count(&self, room: &RoomId) -> Result<usize, RegistryError> {
        Ok(self
            .rooms
            .lock()
            .await
            .get(room)
            .map(BTreeSet::len)
            .unwrap_or(0))
    }

    async fn list_active(&self) -> Result<Vec<RoomActivity>, RegistryError> {
        let rooms = self.rooms.lock().await;
        let mut active: Vec<RoomActivity> = rooms
            .iter()
            .map(|(room_id, members)| RoomActivity {
                room_id: room_id.clone(),
                active_count: members.len(),
            })
            .collect();
        active.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn room(id: &str) -> RoomId {
        RoomId::new(id).unwrap()
    }

    fn user(name: &str) -> Username {
        Username::new(name).unwrap()
    }

    #[tokio::test]
    async fn join_and_leave_track_members() {
        let registry = InMemoryRoomRegistry::new();
        let r1 = room("r1");

        assert_eq!(registry.join(&r1, &user("alice")).await.unwrap(), 1);
        assert_eq!(registry.join(&r1, &user("bob")).await.unwrap(), 2);
        assert_eq!(
            registry.members(&r1).await.unwrap(),
            vec![user("alice"), user("bob")]
        );

        assert!(registry.leave(&r1, &user("alice")).await.unwrap());
        assert_eq!(registry.active_count(&r1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_join_is_rejected() {
        let registry = InMemoryRoomRegistry::new();
        let r1 = room("r1");

        registry.join(&r1, &user("alice")).await.unwrap();
        let err = registry.join(&r1, &user("alice")).await.unwrap_err();

        assert!(matches!(err, RegistryError::AlreadyJoined { .. }));
        assert_eq!(registry.active_count(&r1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn repeated_leave_is_a_noop() {
        let registry = InMemoryRoomRegistry::new();
        let r1 = room("r1");
        registry.join(&r1, &user("alice")).await.unwrap();

        assert!(registry.leave(&r1, &user("alice")).await.unwrap());
        assert!(!registry.leave(&r1, &user("alice")).await.unwrap());
        assert_eq!(registry.active_count(&r1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_active_omits_empty_rooms() {
        let registry = InMemoryRoomRegistry::new();
        registry.join(&room("a"), &user("alice")).await.unwrap();
        registry.join(&room("b"), &user("bob")).await.unwrap();
        registry.leave(&room("b"), &user("bob")).await.unwrap();

        let active = registry.list_active().await.unwrap();
        assert_eq!(
            active,
            vec![RoomActivity {
                room_id: room("a"),
                active_count: 1
            }]
        );
    }

    #[tokio::test]
    async fn concurrent_joins_and_leaves_keep_count_consistent() {
        let registry = Arc::new(InMemoryRoomRegistry::new());
        let r1 = room("busy");

        let mut handles = Vec::new();
        for i in 0..50 {
            let registry = Arc::clone(&registry);
            let r1 = r1.clone();
            handles.push(tokio::spawn(async move {
                let u = user(&format!("user{i}"));
                registry.join(&r1, &u).await.unwrap();
                tokio::task::yield_now().await;
                if i % 2 == 0 {
                    registry.leave(&r1, &u).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let count = registry.active_count(&r1).await.unwrap();
        assert_eq!(count, 25);
        assert_eq!(registry.members(&r1).await.unwrap().len(), count);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Join(usize, usize),
        Leave(usize, usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..3usize, 0..5usize).prop_map(|(r, u)| Op::Join(r, u)),
            (0..3usize, 0..5usize).prop_map(|(r, u)| Op::Leave(r, u)),
        ]
    }

    proptest! {
        #[test]
        fn active_count_always_equals_membership_size(ops in prop::collection::vec(op(), 0..60)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let registry = InMemoryRoomRegistry::new();
                let rooms: Vec<RoomId> = (0..3).map(|i| room(&format!("r{i}"))).collect();
                let users: Vec<Username> = (0..5).map(|i| user(&format!("u{i}"))).collect();
                let mut model: HashMap<usize, BTreeSet<usize>> = HashMap::new();

                for op in ops {
                    match op {
                        Op::Join(r, u) => {
                            let result = registry.join(&rooms[r], &users[u]).await;
                            let inserted = model.entry(r).or_default().insert(u);
                            assert_eq!(result.is_ok(), inserted);
                        }
                        Op::Leave(r, u) => {
                            let removed = registry.leave(&rooms[r], &users[u]).await.unwrap();
                            let expected = model.get_mut(&r).map(|m| m.remove(&u)).unwrap_or(false);
                            assert_eq!(removed, expected);
                        }
                    }

                    for (r, room_id) in rooms.iter().enumerate() {
                        let count = registry.active_count(room_id).await.unwrap();
                        let members = registry.members(room_id).await.unwrap();
                        assert_eq!(count, members.len());
                        assert_eq!(count, model.get(&r).map(BTreeSet::len).unwrap_or(0));
                    }
                }
            });
        }
    }
}
