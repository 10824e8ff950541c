//! Per-project flat counters and officer slots.

use super::domain::{Project, ProjectId, RoomType, UserId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InventoryError {
    #[error("no {} flats left in project {project}", .room_type.label())]
    InsufficientInventory {
        project: ProjectId,
        room_type: RoomType,
    },
    #[error("project {project} already has all {capacity} {} flats available", .room_type.label())]
    CapacityExceeded {
        project: ProjectId,
        room_type: RoomType,
        capacity: u32,
    },
    #[error("project {project} has no officer slots left (limit {limit})")]
    OfficerSlotsFull { project: ProjectId, limit: u8 },
}

impl Project {
    pub fn available_flats(&self, room_type: RoomType) -> u32 {
        self.flats(room_type).available
    }

    /// Take one flat out of inventory. Leaves the project untouched on failure.
    pub fn decrement_flat(&mut self, room_type: RoomType) -> Result<u32, InventoryError> {
        let project = self.id.clone();
        let flats = self.flats_mut(room_type);
        if flats.available == 0 {
            return Err(InventoryError::InsufficientInventory { project, room_type });
        }
        flats.available -= 1;
        Ok(flats.available)
    }

    /// Return one flat to inventory, never beyond the configured capacity.
    pub fn increment_flat(&mut self, room_type: RoomType) -> Result<u32, InventoryError> {
        let project = self.id.clone();
        let flats = self.flats_mut(room_type);
        if flats.available >= flats.capacity {
            return Err(InventoryError::CapacityExceeded {
                project,
                room_type,
                capacity: flats.capacity,
            });
        }
        flats.available += 1;
        Ok(flats.available)
    }

    pub fn assign_officer(&mut self, officer_id: &UserId) -> Result<(), InventoryError> {
        if self.has_officer(officer_id) {
            return Ok(());
        }
        if self.remaining_officer_slots() == 0 {
            return Err(InventoryError::OfficerSlotsFull {
                project: self.id.clone(),
                limit: self.officer_slots,
            });
        }
        self.officers.push(officer_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::allocation::domain::FlatInventory;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn project(two_room: u32, three_room: u32) -> Project {
        Project {
            id: ProjectId::from("P001"),
            name: "Acacia Breeze".to_string(),
            neighborhood: "Yishun".to_string(),
            visible: true,
            open_date: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid"),
            close_date: NaiveDate::from_ymd_opt(2025, 12, 31).expect("valid"),
            two_room: FlatInventory::new(350_000, two_room),
            three_room: FlatInventory::new(450_000, three_room),
            manager_id: UserId::from("M001"),
            officer_slots: 2,
            officers: Vec::new(),
        }
    }

    #[test]
    fn decrement_at_zero_fails_without_mutation() {
        let mut project = project(0, 1);
        let before = project.clone();

        let error = project
            .decrement_flat(RoomType::TwoRoom)
            .expect_err("no two-room flats");

        assert!(matches!(
            error,
            InventoryError::InsufficientInventory {
                room_type: RoomType::TwoRoom,
                ..
            }
        ));
        assert_eq!(project, before);
    }

    #[test]
    fn increment_stops_at_capacity() {
        let mut project = project(2, 0);
        assert!(matches!(
            project.increment_flat(RoomType::TwoRoom),
            Err(InventoryError::CapacityExceeded { capacity: 2, .. })
        ));

        project.decrement_flat(RoomType::TwoRoom).expect("has stock");
        assert_eq!(project.increment_flat(RoomType::TwoRoom), Ok(2));
    }

    #[test]
    fn officer_slots_are_bounded() {
        let mut project = project(1, 1);
        project
            .assign_officer(&UserId::from("O1"))
            .expect("first slot");
        project
            .assign_officer(&UserId::from("O1"))
            .expect("reassigning is a no-op");
        project
            .assign_officer(&UserId::from("O2"))
            .expect("second slot");

        assert!(matches!(
            project.assign_officer(&UserId::from("O3")),
            Err(InventoryError::OfficerSlotsFull { limit: 2, .. })
        ));
        assert_eq!(project.officers.len(), 2);
    }

    proptest! {
        #[test]
        fn decrement_then_increment_restores_count(
            units in 1u32..500,
            taken in 0u32..500,
            three_room in any::<bool>(),
        ) {
            let room_type = if three_room { RoomType::ThreeRoom } else { RoomType::TwoRoom };
            let mut project = project(units, units);
            for _ in 0..taken.min(units - 1) {
                project.decrement_flat(room_type).expect("stock remains");
            }
            let before = project.available_flats(room_type);

            project.decrement_flat(room_type).expect("stock remains");
            project.increment_flat(room_type).expect("below capacity");

            prop_assert_eq!(project.available_flats(room_type), before);
        }

        #[test]
        fn decrement_on_empty_never_mutates(price in any::<u32>()) {
            let mut project = project(0, 0);
            project.two_room.price = price;
            let before = project.clone();
            prop_assert!(project.decrement_flat(RoomType::TwoRoom).is_err());
            prop_assert!(project.decrement_flat(RoomType::ThreeRoom).is_err());
            prop_assert_eq!(project, before);
        }
    }
}
