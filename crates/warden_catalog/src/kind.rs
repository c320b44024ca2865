//! # Check Kinds, Categories and Actions
//!
//! Closed enums. Adding a kind forces every `match` in the workspace to
//! decide what to do with it.

use serde::{Deserialize, Serialize};

/// Kind of integrity probe. Discriminants are the wire codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CheckKind {
    /// Read client memory and compare with a stored result.
    Mem = 0xF3,
    /// Scan all pages for a signature.
    PageA = 0xB2,
    /// Scan module pages for a signature.
    PageB = 0xBF,
    /// Hash a data archive file.
    Mpq = 0x98,
    /// Evaluate a Lua snippet in the client sandbox.
    LuaEval = 0x8B,
    /// Look for a loaded driver.
    Driver = 0x71,
    /// Echo the client tick counter.
    Timing = 0x57,
    /// Inspect a function prologue in a loaded library.
    Proc = 0x7E,
    /// Look for a loaded module by keyed name hash.
    Module = 0xD9,
}

impl CheckKind {
    /// All kinds.
    pub const ALL: [Self; 9] = [
        Self::Mem,
        Self::PageA,
        Self::PageB,
        Self::Mpq,
        Self::LuaEval,
        Self::Driver,
        Self::Timing,
        Self::Proc,
        Self::Module,
    ];

    /// Returns the wire code.
    #[inline]
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Decodes a wire code.
    #[must_use]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            0xF3 => Some(Self::Mem),
            0xB2 => Some(Self::PageA),
            0xBF => Some(Self::PageB),
            0x98 => Some(Self::Mpq),
            0x8B => Some(Self::LuaEval),
            0x71 => Some(Self::Driver),
            0x57 => Some(Self::Timing),
            0x7E => Some(Self::Proc),
            0xD9 => Some(Self::Module),
            _ => None,
        }
    }

    /// Returns the scheduling category, if the kind is scheduled at all.
    #[must_use]
    pub const fn category(self) -> Option<Category> {
        match self {
            Self::PageA | Self::PageB | Self::Driver | Self::Module => Some(Category::Inject),
            Self::LuaEval => Some(Category::Lua),
            Self::Mem | Self::Mpq => Some(Category::Modded),
            Self::Timing | Self::Proc => None,
        }
    }

    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mem => "MEM",
            Self::PageA => "PAGE_A",
            Self::PageB => "PAGE_B",
            Self::Mpq => "MPQ",
            Self::LuaEval => "LUA_EVAL",
            Self::Driver => "DRIVER",
            Self::Timing => "TIMING",
            Self::Proc => "PROC",
            Self::Module => "MODULE",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Scheduling category. Each has its own queue and per-cycle quota.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Category {
    /// Code injection: page scans, drivers, loaded modules.
    Inject,
    /// Sandboxed Lua execution.
    Lua,
    /// Modified memory and data files.
    Modded,
}

impl Category {
    /// All categories, in scheduling order.
    pub const ALL: [Self; 3] = [Self::Inject, Self::Lua, Self::Modded];

    /// Dense index for per-category arrays.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Inject => 0,
            Self::Lua => 1,
            Self::Modded => 2,
        }
    }

    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Inject => "inject",
            Self::Lua => "lua",
            Self::Modded => "modded",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do with a client that failed a check.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Action {
    /// Record only.
    #[default]
    Log = 0,
    /// Disconnect the session.
    Kick = 1,
    /// Ban the account, then disconnect.
    Ban = 2,
}

impl Action {
    /// Decodes a stored action value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Log),
            1 => Some(Self::Kick),
            2 => Some(Self::Ban),
            _ => None,
        }
    }

    /// Returns a short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Kick => "kick",
            Self::Ban => "ban",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
