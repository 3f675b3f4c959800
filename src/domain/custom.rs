use super::event::{FIRST_CUSTOM_EVENT_ID, PayloadShape};
use serde::{Deserialize, Serialize};

/// Payload type of a user-defined event. Discriminants are shared with the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum CustomEventType {
    None = 0,
    String = 1,
    UnsignedInt = 2,
    Bool = 3,
    Timestamp = 4,
    UnsignedShortVec2 = 5,
}

impl CustomEventType {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::String),
            2 => Some(Self::UnsignedInt),
            3 => Some(Self::Bool),
            4 => Some(Self::Timestamp),
            5 => Some(Self::UnsignedShortVec2),
            _ => None,
        }
    }

    pub const fn shape(self) -> PayloadShape {
        match self {
            Self::None => PayloadShape::Empty,
            Self::String => PayloadShape::Str,
            Self::UnsignedInt => PayloadShape::U32,
            Self::Bool => PayloadShape::Bool,
            Self::Timestamp => PayloadShape::Timestamp,
            Self::UnsignedShortVec2 => PayloadShape::Coord,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomEventDef {
    pub name: String,
    #[serde(rename = "type")]
    pub event_type: CustomEventType,
}

impl CustomEventDef {
    pub fn new(name: impl Into<String>, event_type: CustomEventType) -> Self {
        Self {
            name: name.into(),
            event_type,
        }
    }
}

/// Ordered table of custom events. The event at index `i` owns type code
/// `FIRST_CUSTOM_EVENT_ID + i`; entries past `u16::MAX` are unreachable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CustomEventTable {
    events: Vec<CustomEventDef>,
}

impl CustomEventTable {
    pub fn new(events: Vec<CustomEventDef>) -> Self {
        Self { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &CustomEventDef)> {
        (FIRST_CUSTOM_EVENT_ID..=u16::MAX).zip(self.events.iter())
    }

    pub fn get(&self, code: u16) -> Option<&CustomEventDef> {
        let index = code.checked_sub(FIRST_CUSTOM_EVENT_ID)?;
        self.events.get(index as usize)
    }

    pub fn id_of(&self, name: &str) -> Option<u16> {
        self.iter()
            .find(|(_, def)| def.name == name)
            .map(|(id, _)| id)
    }

    pub fn shape_of(&self, code: u16) -> Option<PayloadShape> {
        self.get(code).map(|def| def.event_type.shape())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_assigned_in_table_order() {
        let table = CustomEventTable::new(vec![
            CustomEventDef::new("LevelUp", CustomEventType::UnsignedInt),
            CustomEventDef::new("Tapped", CustomEventType::UnsignedShortVec2),
        ]);

        assert_eq!(table.id_of("LevelUp"), Some(2500));
        assert_eq!(table.id_of("Tapped"), Some(2501));
        assert_eq!(table.id_of("Missing"), None);
        assert_eq!(table.shape_of(2501), Some(PayloadShape::Coord));
        assert_eq!(table.shape_of(2502), None);
        assert_eq!(table.shape_of(42), None);
    }
}
