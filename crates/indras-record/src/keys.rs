//! Well-known keys
//!
//! Two fixed tables of keys are interned: the standard keys every log record
//! tends to carry, and the vendor-namespaced message keys. A key found in
//! either table is stored as a small table index and consumes no arena bytes.

/// Timestamp of the entry; compared as an instant by queries
pub const TIME: &str = "Time";
/// Sub-second part of [`TIME`]
pub const TIME_NANOSEC: &str = "TimeNanoSec";
/// Originating host
pub const HOST: &str = "Host";
/// Originating process name
pub const SENDER: &str = "Sender";
/// Facility the sender logged under
pub const FACILITY: &str = "Facility";
/// Sender process id
pub const PID: &str = "PID";
/// Sender user id
pub const UID: &str = "UID";
/// Sender group id
pub const GID: &str = "GID";
/// Severity, always stored as `"0"` through `"7"`
pub const LEVEL: &str = "Level";
/// Message text, stored without trailing newlines
pub const MESSAGE: &str = "Message";
/// User allowed to read the entry
pub const READ_UID: &str = "ReadUID";
/// Group allowed to read the entry
pub const READ_GID: &str = "ReadGID";
/// Expiry time of the entry
pub const EXPIRE_TIME: &str = "ExpireTime";
/// Store-assigned message id
pub const MESSAGE_ID: &str = "MessageID";
/// Login session of the sender
pub const SESSION: &str = "Session";
/// Process id the sender logged on behalf of
pub const REF_PID: &str = "RefPID";
/// Process name the sender logged on behalf of
pub const REF_PROC: &str = "RefProc";
/// Title of an auxiliary attachment
pub const AUX_TITLE: &str = "AuxTitle";
/// Type identifier of an auxiliary attachment
pub const AUX_UTI: &str = "AuxUTI";
/// Location of an auxiliary attachment
pub const AUX_URL: &str = "AuxURL";
/// Notification name posted when a data record holding it is destroyed
pub const FREE_NOTE: &str = "FreeNotify";
/// Instance tag of the sending process
pub const SENDER_INSTANCE: &str = "SenderInstance";
/// Binary UUID of the sending process
pub const SENDER_MACH_UUID: &str = "SenderMachUUID";
/// Module that produced the entry
pub const MODULE: &str = "Module";
/// Activity the entry belongs to
pub const ACTIVITY_ID: &str = "ActivityID";

static STANDARD_KEYS: [&str; 25] = [
    TIME,
    TIME_NANOSEC,
    HOST,
    SENDER,
    FACILITY,
    PID,
    UID,
    GID,
    LEVEL,
    MESSAGE,
    READ_UID,
    READ_GID,
    EXPIRE_TIME,
    MESSAGE_ID,
    SESSION,
    REF_PID,
    REF_PROC,
    AUX_TITLE,
    AUX_UTI,
    AUX_URL,
    FREE_NOTE,
    SENDER_INSTANCE,
    SENDER_MACH_UUID,
    MODULE,
    ACTIVITY_ID,
];

static VENDOR_KEYS: [&str; 13] = [
    "com.indras.message.domain",
    "com.indras.message.domain_scope",
    "com.indras.message.result",
    "com.indras.message.signature",
    "com.indras.message.signature2",
    "com.indras.message.signature3",
    "com.indras.message.success",
    "com.indras.message.uuid",
    "com.indras.message.value",
    "com.indras.message.value2",
    "com.indras.message.value3",
    "com.indras.message.value4",
    "com.indras.message.value5",
];

/// Common prefix of every vendor key
const VENDOR_PREFIX: &str = "com.indras.message.";

/// Index of an interned key in one of the two tables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum DictKey {
    Standard(u8),
    Vendor(u8),
}

impl DictKey {
    /// Intern `key` if it is one of the well-known keys
    pub(crate) fn lookup(key: &str) -> Option<Self> {
        if key.len() > VENDOR_PREFIX.len() && key.starts_with(VENDOR_PREFIX) {
            return find_by_len(&VENDOR_KEYS, key).map(Self::Vendor);
        }
        find_by_len(&STANDARD_KEYS, key).map(Self::Standard)
    }

    /// The interned string
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Standard(idx) => STANDARD_KEYS[idx as usize],
            Self::Vendor(idx) => VENDOR_KEYS[idx as usize],
        }
    }
}

fn find_by_len(table: &[&'static str], key: &str) -> Option<u8> {
    table
        .iter()
        .position(|candidate| candidate.len() == key.len() && *candidate == key)
        .map(|idx| idx as u8)
}

/// Severity names, indexed by their numeric level
pub const LEVEL_NAMES: [&str; 8] = [
    "Emergency",
    "Alert",
    "Critical",
    "Error",
    "Warning",
    "Notice",
    "Info",
    "Debug",
];

static LEVEL_DIGITS: [&str; 8] = ["0", "1", "2", "3", "4", "5", "6", "7"];

/// Numeric string of the least severe level
pub const LEVEL_DEBUG: &str = "7";

/// Map a level digit or case-insensitive level name to its numeric string
pub fn normalize_level(value: &str) -> Option<&'static str> {
    if let Some(idx) = LEVEL_DIGITS.iter().position(|digit| *digit == value) {
        return Some(LEVEL_DIGITS[idx]);
    }
    LEVEL_NAMES
        .iter()
        .position(|name| name.eq_ignore_ascii_case(value))
        .map(|idx| LEVEL_DIGITS[idx])
}

/// Message text with trailing newlines removed
pub fn trim_message(value: &str) -> &str {
    value.trim_end_matches('\n')
}
