use chrono::{DateTime, Utc};
use serde::Serialize;

/// First type code available to user-defined events.
pub const FIRST_CUSTOM_EVENT_ID: u16 = 2500;

/// Fixed event type codes understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum EventKind {
    AppLaunch = 2,
    GenuinityCheck = 5,
    DeviceType = 6,
    GpuType = 7,
    Os = 8,
    RamSize = 9,
    VramSize = 10,
    ScreenResolution = 11,
    SystemLang = 12,
    ErrorMsg = 13,
    LowMemWarning = 14,
    InstallCampaign = 15,
    SceneLoaded = 16,
    SceneUnloaded = 17,
    DeepLinkActivated = 18,
    InternetDisconnected = 19,
    ButtonClick = 20,
    WindowOpen = 22,
    WindowClose = 23,
    ItemsExchange = 24,
    Country = 26,
    AppPause = 28,
    AppResume = 29,
    InternetConnected = 30,
    PurchaseProductId = 32,
    PurchaseProductPriceUsdCents = 33,
    Platform = 34,
    PurchaseTimestamp = 35,
    AbTestAssignment = 36,
    ItemsReset = 37,
    UserIdAssigned = 38,
    Pointer1Down = 39,
    Pointer1Up = 40,
    BatchDropped = 42,
    GameLang = 43,
    OnboardingMilestone = 50,
}

impl EventKind {
    pub const fn code(self) -> u16 {
        self as u16
    }

    pub fn from_code(code: u16) -> Option<Self> {
        let kind = match code {
            2 => Self::AppLaunch,
            5 => Self::GenuinityCheck,
            6 => Self::DeviceType,
            7 => Self::GpuType,
            8 => Self::Os,
            9 => Self::RamSize,
            10 => Self::VramSize,
            11 => Self::ScreenResolution,
            12 => Self::SystemLang,
            13 => Self::ErrorMsg,
            14 => Self::LowMemWarning,
            15 => Self::InstallCampaign,
            16 => Self::SceneLoaded,
            17 => Self::SceneUnloaded,
            18 => Self::DeepLinkActivated,
            19 => Self::InternetDisconnected,
            20 => Self::ButtonClick,
            22 => Self::WindowOpen,
            23 => Self::WindowClose,
            24 => Self::ItemsExchange,
            26 => Self::Country,
            28 => Self::AppPause,
            29 => Self::AppResume,
            30 => Self::InternetConnected,
            32 => Self::PurchaseProductId,
            33 => Self::PurchaseProductPriceUsdCents,
            34 => Self::Platform,
            35 => Self::PurchaseTimestamp,
            36 => Self::AbTestAssignment,
            37 => Self::ItemsReset,
            38 => Self::UserIdAssigned,
            39 => Self::Pointer1Down,
            40 => Self::Pointer1Up,
            42 => Self::BatchDropped,
            43 => Self::GameLang,
            50 => Self::OnboardingMilestone,
            _ => return None,
        };
        Some(kind)
    }

    /// Payload layout that follows this type code on the wire.
    pub const fn shape(self) -> PayloadShape {
        match self {
            Self::LowMemWarning
            | Self::InternetDisconnected
            | Self::InternetConnected
            | Self::UserIdAssigned => PayloadShape::Empty,
            Self::GenuinityCheck => PayloadShape::Bool,
            Self::RamSize | Self::VramSize => PayloadShape::I32,
            Self::PurchaseProductPriceUsdCents | Self::BatchDropped => PayloadShape::U32,
            Self::AppPause | Self::AppResume | Self::PurchaseTimestamp => PayloadShape::Timestamp,
            Self::ScreenResolution | Self::Pointer1Down | Self::Pointer1Up => PayloadShape::Coord,
            Self::ItemsExchange => PayloadShape::ItemsExchange,
            Self::ItemsReset => PayloadShape::ItemsReset,
            Self::AbTestAssignment => PayloadShape::AbTestAssignment,
            Self::AppLaunch
            | Self::DeviceType
            | Self::GpuType
            | Self::Os
            | Self::SystemLang
            | Self::ErrorMsg
            | Self::InstallCampaign
            | Self::SceneLoaded
            | Self::SceneUnloaded
            | Self::DeepLinkActivated
            | Self::ButtonClick
            | Self::WindowOpen
            | Self::WindowClose
            | Self::Country
            | Self::PurchaseProductId
            | Self::Platform
            | Self::GameLang
            | Self::OnboardingMilestone => PayloadShape::Str,
        }
    }
}

impl From<EventKind> for u16 {
    fn from(kind: EventKind) -> Self {
        kind.code()
    }
}

/// Reason code carried by a `BatchDropped` record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u32)]
pub enum DropReason {
    BrokenCustomEventMapping = 1,
    TooManyUnsentEvents = 2,
}

impl DropReason {
    pub const fn code(self) -> u32 {
        self as u32
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PayloadShape {
    Empty,
    Str,
    U32,
    I32,
    Bool,
    Timestamp,
    Coord,
    ItemsExchange,
    ItemsReset,
    AbTestAssignment,
}

/// A game item and its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Item {
    pub name: String,
    pub count: u32,
}

impl Item {
    pub fn new(name: impl Into<String>, count: u32) -> Self {
        Self {
            name: name.into(),
            count,
        }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self::new(name, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "value")]
pub enum Payload {
    Empty,
    Str(String),
    U32(u32),
    I32(i32),
    Bool(bool),
    /// Seconds since the Unix epoch.
    Timestamp(u32),
    Coord {
        x: u16,
        y: u16,
    },
    ItemsExchange {
        location: String,
        from: Vec<Item>,
        to: Vec<Item>,
    },
    ItemsReset {
        location: String,
        items: Vec<Item>,
    },
    AbTestAssignment {
        test: String,
        group: char,
    },
}

impl Payload {
    pub fn shape(&self) -> PayloadShape {
        match self {
            Self::Empty => PayloadShape::Empty,
            Self::Str(_) => PayloadShape::Str,
            Self::U32(_) => PayloadShape::U32,
            Self::I32(_) => PayloadShape::I32,
            Self::Bool(_) => PayloadShape::Bool,
            Self::Timestamp(_) => PayloadShape::Timestamp,
            Self::Coord { .. } => PayloadShape::Coord,
            Self::ItemsExchange { .. } => PayloadShape::ItemsExchange,
            Self::ItemsReset { .. } => PayloadShape::ItemsReset,
            Self::AbTestAssignment { .. } => PayloadShape::AbTestAssignment,
        }
    }

    pub fn timestamp(at: DateTime<Utc>) -> Self {
        Self::Timestamp(epoch_seconds(at))
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<u32> for Payload {
    fn from(value: u32) -> Self {
        Self::U32(value)
    }
}

impl From<i32> for Payload {
    fn from(value: i32) -> Self {
        Self::I32(value)
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<DateTime<Utc>> for Payload {
    fn from(value: DateTime<Utc>) -> Self {
        Self::timestamp(value)
    }
}

/// One decoded `{typeCode, payload}` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventRecord {
    pub code: u16,
    pub payload: Payload,
}

impl EventRecord {
    pub fn new(code: impl Into<u16>, payload: Payload) -> Self {
        Self {
            code: code.into(),
            payload,
        }
    }

    pub fn kind(&self) -> Option<EventKind> {
        EventKind::from_code(self.code)
    }
}

/// Seconds since the Unix epoch, clamped to the `u32` wire range.
pub fn epoch_seconds(at: DateTime<Utc>) -> u32 {
    at.timestamp().clamp(0, u32::MAX as i64) as u32
}

pub fn unix_time_now() -> u32 {
    epoch_seconds(Utc::now())
}
