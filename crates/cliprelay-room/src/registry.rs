//! Live membership registry.
//!
//! Two indexes are kept in sync: device id to member record, and room id
//! to the set of devices currently in that room. A device has at most one
//! live membership; a room entry is dropped the moment it empties.

use std::collections::{HashMap, HashSet};

use cliprelay_protocol::{DeviceId, RoomId, ServerMessage};
use cliprelay_session::ClientSender;
use cliprelay_transport::ConnectionId;

/// One device's live presence: the connection that owns the membership,
/// the room it sits in, and the channel its pushes go out on.
struct Member {
    connection_id: ConnectionId,
    room_id: RoomId,
    sender: ClientSender,
}

/// Tracks which devices are connected and which room each one belongs to.
///
/// The registry is plain state behind the server's lock; every operation
/// is synchronous. Sends go through unbounded channels, so broadcasting
/// never blocks on a slow receiver.
pub struct RoomRegistry {
    members: HashMap<DeviceId, Member>,
    rooms: HashMap<RoomId, HashSet<DeviceId>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            members: HashMap::new(),
            rooms: HashMap::new(),
        }
    }

    /// Places a device in a room, superseding any previous connection that
    /// held a membership for the same device.
    pub fn join(
        &mut self,
        device_id: DeviceId,
        connection_id: ConnectionId,
        room_id: RoomId,
        sender: ClientSender,
    ) {
        if let Some(old) = self.remove_membership(&device_id) {
            tracing::info!(%device_id, old_connection = %old, "device reconnected, superseding old connection");
        }
        tracing::info!(%device_id, %room_id, %connection_id, "device joined room");
        self.rooms
            .entry(room_id.clone())
            .or_default()
            .insert(device_id.clone());
        self.members.insert(
            device_id,
            Member {
                connection_id,
                room_id,
                sender,
            },
        );
    }

    /// Removes a device's membership, but only if `connection_id` still
    /// owns it. Returns `true` when an entry was actually removed.
    ///
    /// The guard matters on reconnect: once a newer connection has
    /// superseded the membership, the older connection's teardown must not
    /// evict its successor.
    pub fn leave(&mut self, device_id: &DeviceId, connection_id: ConnectionId) -> bool {
        match self.members.get(device_id) {
            Some(member) if member.connection_id == connection_id => {
                self.remove_membership(device_id);
                tracing::info!(%device_id, %connection_id, "device left room");
                true
            }
            _ => false,
        }
    }

    /// The room this device currently belongs to, if it is connected.
    pub fn assigned_room(&self, device_id: &DeviceId) -> Option<RoomId> {
        self.members
            .get(device_id)
            .map(|member| member.room_id.clone())
    }

    /// Delivers `message` to every member of `room_id` except `from`.
    /// Returns the number of members the message was handed to.
    pub fn broadcast_from(
        &self,
        room_id: &RoomId,
        from: &DeviceId,
        message: &ServerMessage,
    ) -> usize {
        self.deliver(room_id, Some(from), message)
    }

    /// Delivers `message` to every member of `room_id`.
    pub fn broadcast(&self, room_id: &RoomId, message: &ServerMessage) -> usize {
        self.deliver(room_id, None, message)
    }

    fn deliver(
        &self,
        room_id: &RoomId,
        exclude: Option<&DeviceId>,
        message: &ServerMessage,
    ) -> usize {
        let Some(device_ids) = self.rooms.get(room_id) else {
            return 0;
        };

        let mut delivered = 0;
        for device_id in device_ids {
            if exclude.is_some_and(|excluded| excluded == device_id) {
                continue;
            }
            let Some(member) = self.members.get(device_id) else {
                continue;
            };
            // A failed send means the receiver task is already gone; its
            // membership will be cleaned up by that connection's teardown.
            if member.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                tracing::debug!(%device_id, "push to closed connection skipped");
            }
        }
        delivered
    }

    /// Number of devices currently in `room_id`.
    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, HashSet::len)
    }

    /// Number of connected devices across all rooms.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Drops the device from both indexes, clearing the room entry when it
    /// empties. Returns the connection id that held the membership.
    fn remove_membership(&mut self, device_id: &DeviceId) -> Option<ConnectionId> {
        let member = self.members.remove(device_id)?;
        if let Some(devices) = self.rooms.get_mut(&member.room_id) {
            devices.remove(device_id);
            if devices.is_empty() {
                self.rooms.remove(&member.room_id);
            }
        }
        Some(member.connection_id)
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
