use indexmap::IndexMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const REGISTER_COUNT: usize = 8;

/// Register names indexed by 3-bit field, `[byte, word]`
const REGISTER_NAMES: [[&str; 2]; REGISTER_COUNT] = [
    ["al", "ax"],
    ["cl", "cx"],
    ["dl", "dx"],
    ["bl", "bx"],
    ["ah", "sp"],
    ["ch", "bp"],
    ["dh", "si"],
    ["bh", "di"],
];

/// Operand width selected by the w flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Byte,
    Word,
}

impl Width {
    pub fn from_flag(is_word: bool) -> Self {
        if is_word {
            Width::Word
        } else {
            Width::Byte
        }
    }

    pub fn is_word(&self) -> bool {
        *self == Width::Word
    }
}

/// A resolved register operand.
///
/// Equality and hashing consider only `index` and `width`; the name is
/// derived from them by the catalog.
#[derive(Debug, Clone, Copy)]
pub struct RegisterDescriptor {
    pub name: &'static str,
    pub width: Width,
    pub index: u8,
}

impl PartialEq for RegisterDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.width == other.width
    }
}

impl Eq for RegisterDescriptor {}

impl Hash for RegisterDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.width.hash(state);
    }
}

impl fmt::Display for RegisterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Bidirectional mapping between (field, width) and register names.
#[derive(Debug, Clone)]
pub struct RegisterCatalog {
    names: [[&'static str; 2]; REGISTER_COUNT],
    by_name: IndexMap<&'static str, RegisterDescriptor>,
}

impl RegisterCatalog {
    pub fn new(names: [[&'static str; 2]; REGISTER_COUNT]) -> Self {
        let mut by_name = IndexMap::with_capacity(REGISTER_COUNT * 2);
        for width in [Width::Byte, Width::Word] {
            for (index, row) in names.iter().enumerate() {
                let name = row[width.is_word() as usize];
                by_name.insert(
                    name,
                    RegisterDescriptor {
                        name,
                        width,
                        index: index as u8,
                    },
                );
            }
        }
        RegisterCatalog { names, by_name }
    }

    /// Resolve a 3-bit register field. Only the low three bits of `field`
    /// are used.
    pub fn lookup(&self, field: u8, width: Width) -> RegisterDescriptor {
        let index = field & 0b111;
        RegisterDescriptor {
            name: self.names[index as usize][width.is_word() as usize],
            width,
            index,
        }
    }

    /// Reverse lookup by register name
    pub fn find(&self, name: &str) -> Option<RegisterDescriptor> {
        self.by_name.get(name).copied()
    }

    /// All descriptors, byte registers first, in field order
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.by_name.values()
    }
}

impl Default for RegisterCatalog {
    fn default() -> Self {
        RegisterCatalog::new(REGISTER_NAMES)
    }
}
