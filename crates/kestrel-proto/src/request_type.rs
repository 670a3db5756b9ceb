//! Command identifiers carried in [`crate::Command::request_type`].
//!
//! The engine never interprets these beyond naming tracing spans; semantics
//! live server-side. Values are part of the wire contract.

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum RequestType {
    InvalidRequest = 0,
    /// An arbitrary command passed through verbatim.
    CustomCommand = 1,
    Get = 2,
    Set = 3,
    Ping = 4,
    Info = 5,
    Del = 6,
    Select = 7,
    ConfigGet = 8,
    ConfigSet = 9,
    ConfigResetStat = 10,
    ConfigRewrite = 11,
    ClientGetName = 12,
    ClientId = 13,
    Echo = 14,
    Expire = 15,
    ExpireAt = 16,
    PExpire = 17,
    PExpireAt = 18,
    Ttl = 19,
    PTtl = 20,
    Persist = 21,
    Exists = 22,
    Unlink = 23,
    Type = 24,
    Rename = 25,
    RenameNx = 26,
    Incr = 27,
    IncrBy = 28,
    IncrByFloat = 29,
    Decr = 30,
    DecrBy = 31,
    MGet = 32,
    MSet = 33,
    MSetNx = 34,
    Append = 35,
    Strlen = 36,
    GetRange = 37,
    SetRange = 38,
    GetDel = 39,
    HGet = 40,
    HSet = 41,
    HDel = 42,
    HGetAll = 43,
    HExists = 44,
    HKeys = 45,
    HVals = 46,
    HLen = 47,
    HIncrBy = 48,
    HIncrByFloat = 49,
    HMGet = 50,
    LPush = 51,
    RPush = 52,
    LPop = 53,
    RPop = 54,
    LRange = 55,
    LLen = 56,
    LRem = 57,
    LTrim = 58,
    LIndex = 59,
    LSet = 60,
    SAdd = 61,
    SRem = 62,
    SMembers = 63,
    SCard = 64,
    SIsMember = 65,
    SPop = 66,
    SInter = 67,
    SUnion = 68,
    SDiff = 69,
    ZAdd = 70,
    ZRem = 71,
    ZScore = 72,
    ZCard = 73,
    ZCount = 74,
    ZRange = 75,
    ZRank = 76,
    ZIncrBy = 77,
    DbSize = 78,
    FlushAll = 79,
    FlushDb = 80,
    Time = 81,
    LastSave = 82,
    Lolwut = 83,
    Publish = 84,
    SPublish = 85,
    Scan = 86,
    Watch = 87,
    Unwatch = 88,
    Multi = 89,
    Exec = 90,
    Discard = 91,
    ScriptExists = 92,
    ScriptFlush = 93,
    ScriptLoad = 94,
    ObjectEncoding = 95,
    ObjectFreq = 96,
    ObjectIdleTime = 97,
    ObjectRefCount = 98,
    Copy = 99,
    Dump = 100,
    Restore = 101,
    RandomKey = 102,
    Move = 103,
    SetEx = 104,
    SetNx = 105,
    GetEx = 106,
    Wait = 107,
}

impl RequestType {
    /// Human-readable command name, used to name tracing spans.
    pub fn name(self) -> &'static str {
        match self {
            RequestType::InvalidRequest => "InvalidRequest",
            RequestType::CustomCommand => "CustomCommand",
            RequestType::Get => "Get",
            RequestType::Set => "Set",
            RequestType::Ping => "Ping",
            RequestType::Info => "Info",
            RequestType::Del => "Del",
            RequestType::Select => "Select",
            RequestType::ConfigGet => "ConfigGet",
            RequestType::ConfigSet => "ConfigSet",
            RequestType::ConfigResetStat => "ConfigResetStat",
            RequestType::ConfigRewrite => "ConfigRewrite",
            RequestType::ClientGetName => "ClientGetName",
            RequestType::ClientId => "ClientId",
            RequestType::Echo => "Echo",
            RequestType::Expire => "Expire",
            RequestType::ExpireAt => "ExpireAt",
            RequestType::PExpire => "PExpire",
            RequestType::PExpireAt => "PExpireAt",
            RequestType::Ttl => "Ttl",
            RequestType::PTtl => "PTtl",
            RequestType::Persist => "Persist",
            RequestType::Exists => "Exists",
            RequestType::Unlink => "Unlink",
            RequestType::Type => "Type",
            RequestType::Rename => "Rename",
            RequestType::RenameNx => "RenameNx",
            RequestType::Incr => "Incr",
            RequestType::IncrBy => "IncrBy",
            RequestType::IncrByFloat => "IncrByFloat",
            RequestType::Decr => "Decr",
            RequestType::DecrBy => "DecrBy",
            RequestType::MGet => "MGet",
            RequestType::MSet => "MSet",
            RequestType::MSetNx => "MSetNx",
            RequestType::Append => "Append",
            RequestType::Strlen => "Strlen",
            RequestType::GetRange => "GetRange",
            RequestType::SetRange => "SetRange",
            RequestType::GetDel => "GetDel",
            RequestType::HGet => "HGet",
            RequestType::HSet => "HSet",
            RequestType::HDel => "HDel",
            RequestType::HGetAll => "HGetAll",
            RequestType::HExists => "HExists",
            RequestType::HKeys => "HKeys",
            RequestType::HVals => "HVals",
            RequestType::HLen => "HLen",
            RequestType::HIncrBy => "HIncrBy",
            RequestType::HIncrByFloat => "HIncrByFloat",
            RequestType::HMGet => "HMGet",
            RequestType::LPush => "LPush",
            RequestType::RPush => "RPush",
            RequestType::LPop => "LPop",
            RequestType::RPop => "RPop",
            RequestType::LRange => "LRange",
            RequestType::LLen => "LLen",
            RequestType::LRem => "LRem",
            RequestType::LTrim => "LTrim",
            RequestType::LIndex => "LIndex",
            RequestType::LSet => "LSet",
            RequestType::SAdd => "SAdd",
            RequestType::SRem => "SRem",
            RequestType::SMembers => "SMembers",
            RequestType::SCard => "SCard",
            RequestType::SIsMember => "SIsMember",
            RequestType::SPop => "SPop",
            RequestType::SInter => "SInter",
            RequestType::SUnion => "SUnion",
            RequestType::SDiff => "SDiff",
            RequestType::ZAdd => "ZAdd",
            RequestType::ZRem => "ZRem",
            RequestType::ZScore => "ZScore",
            RequestType::ZCard => "ZCard",
            RequestType::ZCount => "ZCount",
            RequestType::ZRange => "ZRange",
            RequestType::ZRank => "ZRank",
            RequestType::ZIncrBy => "ZIncrBy",
            RequestType::DbSize => "DbSize",
            RequestType::FlushAll => "FlushAll",
            RequestType::FlushDb => "FlushDb",
            RequestType::Time => "Time",
            RequestType::LastSave => "LastSave",
            RequestType::Lolwut => "Lolwut",
            RequestType::Publish => "Publish",
            RequestType::SPublish => "SPublish",
            RequestType::Scan => "Scan",
            RequestType::Watch => "Watch",
            RequestType::Unwatch => "Unwatch",
            RequestType::Multi => "Multi",
            RequestType::Exec => "Exec",
            RequestType::Discard => "Discard",
            RequestType::ScriptExists => "ScriptExists",
            RequestType::ScriptFlush => "ScriptFlush",
            RequestType::ScriptLoad => "ScriptLoad",
            RequestType::ObjectEncoding => "ObjectEncoding",
            RequestType::ObjectFreq => "ObjectFreq",
            RequestType::ObjectIdleTime => "ObjectIdleTime",
            RequestType::ObjectRefCount => "ObjectRefCount",
            RequestType::Copy => "Copy",
            RequestType::Dump => "Dump",
            RequestType::Restore => "Restore",
            RequestType::RandomKey => "RandomKey",
            RequestType::Move => "Move",
            RequestType::SetEx => "SetEx",
            RequestType::SetNx => "SetNx",
            RequestType::GetEx => "GetEx",
            RequestType::Wait => "Wait",
        }
    }
}
