/// 房间注册表
/// 
/// 进程内唯一的房间目录：room_id -> {users, agents, created_at}。
/// 所有房间共用一把读写锁；修改操作持写锁，路由查询持读锁，
/// 并在任何网络 I/O 之前释放。

use common::protocol::{RoomInfo, RoomMember, RoomSummary};
use common::utils::now_millis;
use common::ClientType;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::connection::ClientHandle;

/// 房间
struct Room {
    users: HashMap<String, Arc<ClientHandle>>,
    agents: HashMap<String, Arc<ClientHandle>>,
    created_at: i64,
}

impl Room {
    fn new() -> Self {
        Self {
            users: HashMap::new(),
            agents: HashMap::new(),
            created_at: now_millis(),
        }
    }

    fn pool(&self, client_type: ClientType) -> &HashMap<String, Arc<ClientHandle>> {
        match client_type {
            ClientType::User => &self.users,
            ClientType::Agent => &self.agents,
        }
    }

    fn pool_mut(&mut self, client_type: ClientType) -> &mut HashMap<String, Arc<ClientHandle>> {
        match client_type {
            ClientType::User => &mut self.users,
            ClientType::Agent => &mut self.agents,
        }
    }

    fn is_empty(&self) -> bool {
        self.users.is_empty() && self.agents.is_empty()
    }
}

/// 房间快照
///
/// 持有成员句柄的副本，不持有锁
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub users: Vec<Arc<ClientHandle>>,
    pub agents: Vec<Arc<ClientHandle>>,
    pub created_at: i64,
}

impl RoomSnapshot {
    pub fn pool(&self, client_type: ClientType) -> &[Arc<ClientHandle>] {
        match client_type {
            ClientType::User => &self.users,
            ClientType::Agent => &self.agents,
        }
    }

    /// 房间内所有成员（users 在前）
    pub fn members(&self) -> impl Iterator<Item = &Arc<ClientHandle>> {
        self.users.iter().chain(self.agents.iter())
    }

    pub fn user_ids(&self) -> Vec<String> {
        self.users.iter().map(|c| c.client_id.clone()).collect()
    }

    pub fn agent_ids(&self) -> Vec<String> {
        self.agents.iter().map(|c| c.client_id.clone()).collect()
    }

    /// 生成房间详情（包含成员元数据）
    pub async fn info(&self) -> RoomInfo {
        let mut users = Vec::with_capacity(self.users.len());
        for client in &self.users {
            users.push(RoomMember {
                client_id: client.client_id.clone(),
                metadata: client.metadata().await,
            });
        }

        let mut agents = Vec::with_capacity(self.agents.len());
        for client in &self.agents {
            agents.push(RoomMember {
                client_id: client.client_id.clone(),
                metadata: client.metadata().await,
            });
        }

        RoomInfo {
            room_id: self.room_id.clone(),
            users,
            agents,
            created_at: self.created_at,
        }
    }
}

/// 移除结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveOutcome {
    /// 是否移除了该连接的记录
    pub removed: bool,
    /// 房间是否因此被删除
    pub room_evicted: bool,
}

/// 房间注册表
#[derive(Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<RwLock<HashMap<String, Room>>>,
}

impl RoomRegistry {
    /// 创建新的注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 将客户端加入房间，房间不存在时自动创建
    ///
    /// 同一池中已存在相同 client_id 时原地覆盖，并返回被替换的旧连接。
    /// `on_admit` 在写锁内以加入后的房间快照调用，只允许做非阻塞入队，
    /// 保证新成员的第一帧先于其他成员的任何通告。
    pub async fn admit<F>(&self, client: Arc<ClientHandle>, on_admit: F) -> Option<Arc<ClientHandle>>
    where
        F: FnOnce(&RoomSnapshot),
    {
        let mut rooms = self.rooms.write().await;

        let room = rooms.entry(client.room_id.clone()).or_insert_with(|| {
            info!("创建房间: {}", client.room_id);
            Room::new()
        });

        let replaced = room
            .pool_mut(client.client_type)
            .insert(client.client_id.clone(), client.clone());

        debug!(
            "客户端 {} ({}) 加入房间 {}: users={}, agents={}",
            client.client_id,
            client.client_type,
            client.room_id,
            room.users.len(),
            room.agents.len()
        );

        on_admit(&snapshot_of(&client.room_id, room));

        replaced
    }

    #[cfg(test)]
    pub async fn add(&self, client: Arc<ClientHandle>) -> Option<Arc<ClientHandle>> {
        self.admit(client, |_| {}).await
    }

    /// 将客户端移出房间，房间为空时一并删除
    ///
    /// 只有当池中记录仍属于该连接时才移除，房间已被删除时不做任何事
    pub async fn remove(&self, client: &ClientHandle) -> RemoveOutcome {
        let mut rooms = self.rooms.write().await;

        let Some(room) = rooms.get_mut(&client.room_id) else {
            return RemoveOutcome { removed: false, room_evicted: false };
        };

        let pool = room.pool_mut(client.client_type);
        let owned = pool
            .get(&client.client_id)
            .is_some_and(|current| current.connection_id == client.connection_id);

        if !owned {
            return RemoveOutcome { removed: false, room_evicted: false };
        }

        pool.remove(&client.client_id);

        let room_evicted = room.is_empty();
        if room_evicted {
            rooms.remove(&client.room_id);
            info!("房间已清空并删除: {}", client.room_id);
        }

        RemoveOutcome { removed: true, room_evicted }
    }

    /// 获取房间快照
    pub async fn snapshot(&self, room_id: &str) -> Option<RoomSnapshot> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).map(|room| snapshot_of(room_id, room))
    }

    /// 所有房间的概要
    pub async fn list(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;

        let mut summaries: Vec<RoomSummary> = rooms
            .iter()
            .map(|(room_id, room)| RoomSummary {
                room_id: room_id.clone(),
                user_count: room.users.len(),
                agent_count: room.agents.len(),
                created_at: room.created_at,
            })
            .collect();

        summaries.sort_by(|a, b| a.room_id.cmp(&b.room_id));
        summaries
    }

    /// 房间数量
    pub async fn count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

fn snapshot_of(room_id: &str, room: &Room) -> RoomSnapshot {
    RoomSnapshot {
        room_id: room_id.to_string(),
        users: sorted_members(room.pool(ClientType::User)),
        agents: sorted_members(room.pool(ClientType::Agent)),
        created_at: room.created_at,
    }
}

fn sorted_members(pool: &HashMap<String, Arc<ClientHandle>>) -> Vec<Arc<ClientHandle>> {
    let mut members: Vec<Arc<ClientHandle>> = pool.values().cloned().collect();
    members.sort_by(|a, b| a.client_id.cmp(&b.client_id));
    members
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::connection::{fan_out, OutboundFrame};
    use crate::ws::testing::client;

    #[tokio::test]
    async fn test_add_creates_room() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = client("r1", "alice", ClientType::User, 4);

        assert!(registry.add(alice).await.is_none());

        let snapshot = registry.snapshot("r1").await.unwrap();
        assert_eq!(snapshot.user_ids(), vec!["alice".to_string()]);
        assert!(snapshot.agent_ids().is_empty());
        assert!(snapshot.created_at > 0);
        assert_eq!(registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_admit_sees_own_membership() {
        let registry = RoomRegistry::new();
        let (alice, _rx1) = client("r1", "alice", ClientType::User, 4);
        let (bot, _rx2) = client("r1", "bot", ClientType::Agent, 4);
        registry.add(alice).await;

        let mut seen = None;
        registry
            .admit(bot, |snapshot| seen = Some((snapshot.user_ids(), snapshot.agent_ids())))
            .await;

        assert_eq!(seen, Some((vec!["alice".to_string()], vec!["bot".to_string()])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_admit_greets_before_concurrent_announcements() {
        let registry = RoomRegistry::new();

        let mut joins = Vec::new();
        for i in 0..16 {
            let registry = registry.clone();
            joins.push(tokio::spawn(async move {
                let (member, rx) = client("r1", &format!("u{}", i), ClientType::User, 64);
                registry
                    .admit(member.clone(), |_| {
                        member
                            .deliver(OutboundFrame::Text(format!("welcome {}", member.client_id)))
                            .unwrap();
                    })
                    .await;

                let snapshot = registry.snapshot("r1").await.unwrap();
                let others: Vec<_> = snapshot
                    .members()
                    .filter(|m| m.connection_id != member.connection_id)
                    .cloned()
                    .collect();
                fan_out(&others, OutboundFrame::Text(format!("joined {}", member.client_id)));
                (member, rx)
            }));
        }

        for join in joins {
            let (member, mut rx) = join.await.unwrap();
            let first = rx.recv().await.unwrap();
            assert_eq!(first, OutboundFrame::Text(format!("welcome {}", member.client_id)));
        }
    }

    #[tokio::test]
    async fn test_rejoin_overwrites_slot() {
        let registry = RoomRegistry::new();
        let (first, _rx1) = client("r1", "alice", ClientType::User, 4);
        let (second, _rx2) = client("r1", "alice", ClientType::User, 4);

        registry.add(first.clone()).await;
        let replaced = registry.add(second.clone()).await.unwrap();

        assert_eq!(replaced.connection_id, first.connection_id);
        let snapshot = registry.snapshot("r1").await.unwrap();
        assert_eq!(snapshot.users.len(), 1);
        assert_eq!(snapshot.users[0].connection_id, second.connection_id);
    }

    #[tokio::test]
    async fn test_same_id_in_both_pools() {
        let registry = RoomRegistry::new();
        let (user, _rx1) = client("r1", "x", ClientType::User, 4);
        let (agent, _rx2) = client("r1", "x", ClientType::Agent, 4);

        registry.add(user).await;
        assert!(registry.add(agent).await.is_none());

        let snapshot = registry.snapshot("r1").await.unwrap();
        assert_eq!(snapshot.user_ids(), vec!["x".to_string()]);
        assert_eq!(snapshot.agent_ids(), vec!["x".to_string()]);
    }

    #[tokio::test]
    async fn test_last_departure_evicts_room() {
        let registry = RoomRegistry::new();
        let (alice, _rx1) = client("r1", "alice", ClientType::User, 4);
        let (bot, _rx2) = client("r1", "bot1", ClientType::Agent, 4);
        registry.add(alice.clone()).await;
        registry.add(bot.clone()).await;

        let outcome = registry.remove(&alice).await;
        assert_eq!(outcome, RemoveOutcome { removed: true, room_evicted: false });
        assert!(registry.snapshot("r1").await.unwrap().users.is_empty());

        let outcome = registry.remove(&bot).await;
        assert_eq!(outcome, RemoveOutcome { removed: true, room_evicted: true });
        assert!(registry.snapshot("r1").await.is_none());
        assert_eq!(registry.count().await, 0);
    }

    #[tokio::test]
    async fn test_stale_connection_does_not_remove_replacement() {
        let registry = RoomRegistry::new();
        let (stale, _rx1) = client("r1", "alice", ClientType::User, 4);
        let (fresh, _rx2) = client("r1", "alice", ClientType::User, 4);
        registry.add(stale.clone()).await;
        registry.add(fresh.clone()).await;

        let outcome = registry.remove(&stale).await;
        assert!(!outcome.removed);

        let snapshot = registry.snapshot("r1").await.unwrap();
        assert_eq!(snapshot.users[0].connection_id, fresh.connection_id);
    }

    #[tokio::test]
    async fn test_remove_after_room_deleted_is_noop() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = client("r1", "alice", ClientType::User, 4);
        registry.add(alice.clone()).await;
        registry.remove(&alice).await;

        let outcome = registry.remove(&alice).await;
        assert_eq!(outcome, RemoveOutcome { removed: false, room_evicted: false });
    }

    #[tokio::test]
    async fn test_list_summaries() {
        let registry = RoomRegistry::new();
        let (a, _rx1) = client("r2", "a", ClientType::User, 4);
        let (b, _rx2) = client("r1", "b", ClientType::User, 4);
        let (c, _rx3) = client("r1", "c", ClientType::Agent, 4);
        registry.add(a).await;
        registry.add(b).await;
        registry.add(c).await;

        let rooms = registry.list().await;
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].room_id, "r1");
        assert_eq!((rooms[0].user_count, rooms[0].agent_count), (1, 1));
        assert_eq!(rooms[1].room_id, "r2");
        assert_eq!((rooms[1].user_count, rooms[1].agent_count), (1, 0));
    }

    #[tokio::test]
    async fn test_snapshot_info_includes_metadata() {
        let registry = RoomRegistry::new();
        let (alice, _rx) = client("r1", "alice", ClientType::User, 4);
        registry.add(alice.clone()).await;

        let mut patch = serde_json::Map::new();
        patch.insert("lang".to_string(), serde_json::json!("en"));
        alice.merge_metadata(patch).await;

        let info = registry.snapshot("r1").await.unwrap().info().await;
        assert_eq!(info.room_id, "r1");
        assert_eq!(info.users.len(), 1);
        assert_eq!(info.users[0].client_id, "alice");
        assert_eq!(info.users[0].metadata.get("lang"), Some(&serde_json::json!("en")));
        assert!(info.agents.is_empty());
    }
}
