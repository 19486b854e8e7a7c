// Room catalog access and the availability filter applied before the guest
// enters the booking wizard.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::RoomSelection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    Cleaning,
}

// A room as advertised in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub room_id: String,
    pub room_type: String,
    pub number: u32,
    pub capacity: u32,
    pub price_per_night: f64,
    pub status: RoomStatus,
}

impl Room {
    pub fn selection(&self) -> RoomSelection {
        RoomSelection {
            room_id: self.room_id.clone(),
            room_type: self.room_type.clone(),
            number: self.number,
            capacity: self.capacity,
            price_per_night: self.price_per_night,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StayRange {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

// A date span already committed to an existing booking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookedSpan {
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
}

impl BookedSpan {
    // Half-open overlap: a check-out day frees the room for a same-day
    // check-in.
    fn overlaps(&self, stay: &StayRange) -> bool {
        stay.check_in < self.check_out && stay.check_out > self.check_in
    }
}

#[derive(Error, Debug)]
pub enum RoomSourceError {
    #[error("Room {0} not found")]
    NotFound(String),

    #[error("Room source unavailable: {0}")]
    Unavailable(String),
}

// Seam to wherever rooms live. The booking flow only reads.
#[async_trait]
pub trait RoomDataSource: Send + Sync {
    async fn list_rooms(&self) -> Result<Vec<Room>, RoomSourceError>;
    async fn update_room_status(&self, id: &str, status: RoomStatus)
        -> Result<(), RoomSourceError>;
}

// Keeps rooms advertised as Available with enough capacity, dropping any
// whose committed spans overlap the requested stay. Order is preserved.
// Fails closed: without overlap data we filter on capacity and advertised
// status only, never assuming more availability than the catalog claims.
pub fn filter_available(
    rooms: &[Room],
    min_capacity: u32,
    stay: Option<&StayRange>,
    committed: Option<&[BookedSpan]>,
) -> Vec<Room> {
    rooms
        .iter()
        .filter(|room| room.status == RoomStatus::Available)
        .filter(|room| room.capacity >= min_capacity)
        .filter(|room| match (stay, committed) {
            (Some(stay), Some(committed)) => !committed
                .iter()
                .any(|span| span.room_id == room.room_id && span.overlaps(stay)),
            _ => true,
        })
        .cloned()
        .collect()
}

pub struct InMemoryRoomSource {
    rooms: RwLock<Vec<Room>>,
}

impl InMemoryRoomSource {
    pub fn new(rooms: Vec<Room>) -> Self {
        Self {
            rooms: RwLock::new(rooms),
        }
    }
}

#[async_trait]
impl RoomDataSource for InMemoryRoomSource {
    async fn list_rooms(&self) -> Result<Vec<Room>, RoomSourceError> {
        Ok(self.rooms.read().clone())
    }

    async fn update_room_status(
        &self,
        id: &str,
        status: RoomStatus,
    ) -> Result<(), RoomSourceError> {
        let mut rooms = self.rooms.write();
        let room = rooms
            .iter_mut()
            .find(|room| room.room_id == id)
            .ok_or_else(|| RoomSourceError::NotFound(id.to_string()))?;
        room.status = status;
        Ok(())
    }
}
