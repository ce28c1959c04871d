//! Planar geometry for located entities.
//!
//! Coordinates are optional integers; an absent coordinate counts as 0, so an
//! entity without a location sits at the origin.

use serde::{Deserialize, Serialize};

/// Anything with an (x, y) position on the site plan.
pub trait Located {
    fn x_location(&self) -> i64;
    fn y_location(&self) -> i64;

    /// Euclidean distance to `other`, rounded to the nearest integer.
    ///
    /// ```
    /// use maintenance_scheduling::geometry::{Located, Room};
    ///
    /// let a = Room::with_location(1, "Room A", 0, 0);
    /// let b = Room::with_location(2, "Room B", 3, 4);
    /// assert_eq!(a.distance(&b), 5);
    /// assert_eq!(b.distance(&a), 5);
    /// ```
    fn distance<L: Located + ?Sized>(&self, other: &L) -> i64 {
        // Squared in f64: i64 squares overflow for extreme coordinates.
        let dx = (other.x_location() - self.x_location()) as f64;
        let dy = (other.y_location() - self.y_location()) as f64;
        (dx * dx + dy * dy).sqrt().round() as i64
    }
}

/// A room on the site plan, such as a workshop or a storage bay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: u64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_location: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_location: Option<i32>,
}

impl Room {
    /// Creates a room without coordinates. The name is trimmed.
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.trim().to_string(),
            x_location: None,
            y_location: None,
        }
    }

    pub fn with_location(id: u64, name: &str, x: i32, y: i32) -> Self {
        Self {
            x_location: Some(x),
            y_location: Some(y),
            ..Self::new(id, name)
        }
    }
}

impl Located for Room {
    fn x_location(&self) -> i64 {
        i64::from(self.x_location.unwrap_or(0))
    }

    fn y_location(&self) -> i64 {
        i64::from(self.y_location.unwrap_or(0))
    }
}

impl std::fmt::Display for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_to_self_is_zero() {
        let room = Room::with_location(1, "Lab", -17, 42);
        assert_eq!(room.distance(&room), 0);
        let twin = Room::with_location(2, "Lab copy", -17, 42);
        assert_eq!(room.distance(&twin), 0);
    }

    #[test]
    fn test_absent_coordinates_are_origin() {
        let nowhere = Room::new(1, "  Storage  ");
        assert_eq!(nowhere.name, "Storage");
        let there = Room::with_location(2, "Gym", 6, 8);
        let origin = Room::with_location(3, "Origin", 0, 0);
        assert_eq!(nowhere.distance(&there), origin.distance(&there));
        assert_eq!(nowhere.distance(&there), 10);

        let half = Room {
            id: 4,
            name: "Half".to_string(),
            x_location: Some(5),
            y_location: None,
        };
        assert_eq!(nowhere.distance(&half), 5);
    }

    #[test]
    fn test_distance_is_symmetric_and_rounded() {
        let rooms = [
            Room::with_location(1, "A", 0, 0),
            Room::with_location(2, "B", 1, 1),
            Room::with_location(3, "C", -7, 3),
            Room::with_location(4, "D", 100, -250),
            Room::new(5, "E"),
        ];
        for a in &rooms {
            for b in &rooms {
                assert_eq!(a.distance(b), b.distance(a));
                assert!(a.distance(b) >= 0);
            }
        }
        // sqrt(2) = 1.414.. rounds down, sqrt(5) = 2.236.. rounds down, sqrt(8) = 2.83 rounds up
        assert_eq!(rooms[0].distance(&rooms[1]), 1);
        assert_eq!(rooms[0].distance(&Room::with_location(6, "F", 1, 2)), 2);
        assert_eq!(rooms[0].distance(&Room::with_location(7, "G", 2, 2)), 3);
    }

    #[test]
    fn test_extreme_coordinates_do_not_overflow() {
        let a = Room::with_location(1, "A", i32::MIN, i32::MIN);
        let b = Room::with_location(2, "B", i32::MAX, i32::MAX);
        let d = a.distance(&b);
        assert!(d > 0);
        assert_eq!(d, b.distance(&a));
    }
}
