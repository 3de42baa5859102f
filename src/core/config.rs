//! Signal table, gear-ratio and bus-mapping configuration.
//!
//! The configuration is split across three files, mirroring the layout used
//! by the upstream vehicle-signal deployments:
//!
//! - a top-level JSON file pointing at the signal map and gear table:
//!   `{"wheel_map": "<path>", "gear_para": "<path>"}`
//! - the signal map: `{"PROPERTYS": [{"PROPERTY": "VehicleSpeed", "TYPE":
//!   "uint16_t", "CANID": "048", "BIT_POSITION": "8", "BIT_SIZE": "16",
//!   "DLC": "4"}, ...]}` — numeric fields are strings and accept `0x`/octal
//!   prefixes.
//! - the gear table: `{"GEAR_PARA": [{"POS": "First", "VAL": 4.12}, ...]}`
//!
//! The bus mapping (`hs="can0"` lines) lives in a separate INI-style file.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use crate::core::error::{Result, SenderError};

/// Maximum frame payload expressible in the ASCII text form: 8 bytes,
/// i.e. 16 hex characters after the `#`.
pub const MAX_PAYLOAD_HEX: usize = 16;

/// Longest rendered frame text accepted by the transmit queue (3-char
/// CAN-ID, `#`, 16 hex chars). Extended identifiers eat into the payload
/// budget: an 8-char CAN-ID leaves room for a DLC of at most 5.
pub const MAX_FRAME_TEXT: usize = 20;

// ============================================================================
// Value types
// ============================================================================

/// Declared value type of a signal, matching the upstream type-name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Void,
    Int8,
    Int16,
    /// Generic `int` (32-bit).
    Int,
    Int32,
    Int64,
    UInt8,
    UInt16,
    /// Generic `uint` (32-bit).
    UInt,
    UInt32,
    UInt64,
    String,
    Bool,
    List,
    /// Vendor-specific "ENABLE-1" marker type.
    Enable1,
}

impl ValueType {
    /// Parse the upstream type-name spelling (`"uint16_t"`, `"LIST"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "void" => Some(Self::Void),
            "int8_t" => Some(Self::Int8),
            "int16_t" => Some(Self::Int16),
            "int" => Some(Self::Int),
            "int32_t" => Some(Self::Int32),
            "int64_t" => Some(Self::Int64),
            "uint8_t" => Some(Self::UInt8),
            "uint16_t" => Some(Self::UInt16),
            "uint" => Some(Self::UInt),
            "uint32_t" => Some(Self::UInt32),
            "uint64_t" => Some(Self::UInt64),
            "string" => Some(Self::String),
            "bool" => Some(Self::Bool),
            "LIST" => Some(Self::List),
            "ENABLE-1" => Some(Self::Enable1),
            _ => None,
        }
    }

    /// Upstream spelling of this type.
    pub fn as_name(&self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Int8 => "int8_t",
            Self::Int16 => "int16_t",
            Self::Int => "int",
            Self::Int32 => "int32_t",
            Self::Int64 => "int64_t",
            Self::UInt8 => "uint8_t",
            Self::UInt16 => "uint16_t",
            Self::UInt => "uint",
            Self::UInt32 => "uint32_t",
            Self::UInt64 => "uint64_t",
            Self::String => "string",
            Self::Bool => "bool",
            Self::List => "LIST",
            Self::Enable1 => "ENABLE-1",
        }
    }

    /// Declared width in bits. Non-numeric types default to the width of the
    /// 32-bit value cell.
    pub fn bits(&self) -> u8 {
        match self {
            Self::Int8 | Self::UInt8 | Self::Bool => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Int64 | Self::UInt64 => 64,
            _ => 32,
        }
    }
}

// ============================================================================
// Signal descriptors
// ============================================================================

/// A single configured signal: where its bits live inside a CAN frame.
///
/// The current value is held in a 32-bit cell; updates are truncated to the
/// declared type's width before compare-and-store (see `store_update`).
#[derive(Debug, Clone)]
pub struct SignalDescriptor {
    /// Unique signal name (e.g. "VehicleSpeed").
    pub name: String,

    /// Declared value type.
    pub value_type: ValueType,

    /// Owning CAN identifier as text, 3 (standard) or 8 (extended) hex digits.
    pub can_id: String,

    /// Bit offset measured from the most-significant end of the payload.
    pub bit_pos: u8,

    /// Bit width of the signal.
    pub bit_size: u8,

    /// Frame payload length in bytes.
    pub dlc: u8,

    /// Current raw value cell.
    current: u32,
}

impl SignalDescriptor {
    /// Validate the descriptor against the encoding constraints.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(SenderError::config("signal name is empty"));
        }
        let id_len = self.can_id.len();
        if (id_len != 3 && id_len != 8) || !self.can_id.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SenderError::config(format!(
                "signal {}: CAN-ID {:?} must be 3 or 8 hex digits",
                self.name, self.can_id
            )));
        }
        if usize::from(self.dlc) * 2 > MAX_PAYLOAD_HEX {
            return Err(SenderError::config(format!(
                "signal {}: DLC {} exceeds the {}-byte text payload limit",
                self.name,
                self.dlc,
                MAX_PAYLOAD_HEX / 2
            )));
        }
        // The queue truncates longer texts, which would mangle the frame.
        let rendered = id_len + 1 + usize::from(self.dlc) * 2;
        if rendered > MAX_FRAME_TEXT {
            return Err(SenderError::config(format!(
                "signal {}: CAN-ID {} with DLC {} renders {} chars, above the {}-char frame text limit",
                self.name, self.can_id, self.dlc, rendered, MAX_FRAME_TEXT
            )));
        }
        if self.bit_size == 0 || self.bit_size > 64 {
            return Err(SenderError::config(format!(
                "signal {}: bit size {} out of range 1..=64",
                self.name, self.bit_size
            )));
        }
        // Silent overflow into adjacent bytes was possible upstream; reject it.
        let frame_bits = u16::from(self.dlc) * 8;
        if u16::from(self.bit_pos) + u16::from(self.bit_size) > frame_bits {
            return Err(SenderError::config(format!(
                "signal {}: bit span {}+{} exceeds frame width {} bits",
                self.name, self.bit_pos, self.bit_size, frame_bits
            )));
        }
        Ok(())
    }

    /// Truncate `val` to the declared type's width (capped at the 32-bit
    /// cell) and store it. Returns `true` when the stored value changed.
    pub fn store_update(&mut self, val: i32) -> bool {
        let width = self.value_type.bits().min(32);
        let mask = if width >= 32 {
            u32::MAX
        } else {
            (1u32 << width) - 1
        };
        let new = (val as u32) & mask;
        if new == self.current {
            return false;
        }
        self.current = new;
        true
    }

    /// Current raw value cell.
    pub fn current_value(&self) -> u32 {
        self.current
    }
}

// ============================================================================
// Gear-ratio table
// ============================================================================

/// Gear position indices for the ratio table.
const GEAR_POSITIONS: [&str; 8] = [
    "Neutral", "First", "Second", "Third", "Fourth", "Fifth", "Sixth", "Reverse",
];

/// Gear ratios, ingested from configuration. Values are stored as `1 / VAL`;
/// the table carries no scaling semantics inside this crate.
#[derive(Debug, Clone)]
pub struct GearRatioTable {
    ratios: [f64; 8],
}

impl Default for GearRatioTable {
    fn default() -> Self {
        Self {
            ratios: [
                0.0,        // Neutral
                1.0 / 4.12, // First
                1.0 / 2.84, // Second
                1.0 / 2.28, // Third
                1.0 / 1.45, // Fourth
                1.0 / 1.0,  // Fifth
                1.0 / 0.69, // Sixth
                1.0 / 3.21, // Reverse
            ],
        }
    }
}

impl GearRatioTable {
    /// Override the ratio for a named gear position. Unknown names and
    /// non-positive values are ignored.
    pub fn set(&mut self, pos: &str, val: f64) {
        if val <= 0.0 {
            return;
        }
        // Neutral is fixed at 0.0 and not configurable upstream.
        if let Some(idx) = GEAR_POSITIONS.iter().position(|p| *p == pos) {
            if idx != 0 {
                self.ratios[idx] = 1.0 / val;
            }
        }
    }

    /// Ratio for a gear index (0 = Neutral .. 7 = Reverse).
    pub fn ratio(&self, gear: usize) -> Option<f64> {
        self.ratios.get(gear).copied()
    }
}

// ============================================================================
// Bus mapping
// ============================================================================

/// Interface names for the high-speed and low-speed transmission buses,
/// read from an INI-style mapping file with `hs="can0"` lines.
#[derive(Debug, Clone, Default)]
pub struct BusMapping {
    pub hs: Option<String>,
    pub ls: Option<String>,
}

impl BusMapping {
    /// Parse mapping text. `[section]` headers and unknown keys are skipped.
    pub fn parse(text: &str) -> Self {
        let mut mapping = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('[') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').to_string();
            match key.trim() {
                "hs" => mapping.hs = Some(value),
                "ls" => mapping.ls = Some(value),
                _ => {}
            }
        }
        mapping
    }

    /// Read and parse a mapping file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SenderError::config(format!(
                "cannot read bus mapping {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(Self::parse(&text))
    }
}

// ============================================================================
// Raw serde structs for JSON deserialization
// ============================================================================

/// Top-level configuration file: paths to the signal map and gear table.
#[derive(Debug, Clone, Deserialize)]
struct TopLevelFile {
    wheel_map: String,
    #[serde(default)]
    gear_para: Option<String>,
}

/// Signal map file.
#[derive(Debug, Clone, Deserialize)]
struct WheelMapFile {
    #[serde(rename = "PROPERTYS")]
    properties: Vec<RawProperty>,
}

/// One signal entry as it appears in the JSON (numeric fields are strings).
#[derive(Debug, Clone, Deserialize)]
struct RawProperty {
    #[serde(rename = "PROPERTY")]
    property: String,

    #[serde(rename = "TYPE", default = "default_type")]
    value_type: String,

    #[serde(rename = "CANID")]
    can_id: String,

    #[serde(rename = "BIT_POSITION", default = "default_num")]
    bit_position: String,

    #[serde(rename = "BIT_SIZE", default = "default_num")]
    bit_size: String,

    #[serde(rename = "DLC", default = "default_num")]
    dlc: String,
}

fn default_type() -> String {
    "void".to_string()
}

fn default_num() -> String {
    "0".to_string()
}

/// Gear table file.
#[derive(Debug, Clone, Deserialize)]
struct GearParaFile {
    #[serde(rename = "GEAR_PARA")]
    entries: Vec<RawGearEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawGearEntry {
    #[serde(rename = "POS")]
    pos: String,

    #[serde(rename = "VAL")]
    val: f64,
}

/// Parse a numeric config field with auto radix: `0x` prefix is hex, a
/// leading `0` is octal, otherwise decimal (the upstream loader used
/// `strtoul(_, _, 0)`).
fn parse_auto_u8(field: &str, ctx: &str) -> Result<u8> {
    let s = field.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        u8::from_str_radix(&s[1..], 8)
    } else {
        s.parse::<u8>()
    };
    parsed.map_err(|_| SenderError::config(format!("{}: invalid number {:?}", ctx, field)))
}

impl RawProperty {
    fn into_descriptor(self) -> Result<SignalDescriptor> {
        let value_type = ValueType::from_name(&self.value_type).ok_or_else(|| {
            SenderError::config(format!(
                "signal {}: unknown type {:?}",
                self.property, self.value_type
            ))
        })?;
        let descriptor = SignalDescriptor {
            bit_pos: parse_auto_u8(&self.bit_position, &self.property)?,
            bit_size: parse_auto_u8(&self.bit_size, &self.property)?,
            dlc: parse_auto_u8(&self.dlc, &self.property)?,
            name: self.property,
            value_type,
            can_id: self.can_id,
            current: 0,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

// ============================================================================
// SenderConfig
// ============================================================================

/// Loaded sender configuration: the signal table plus the gear-ratio table.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub signals: Vec<SignalDescriptor>,
    pub gear_ratio: GearRatioTable,
}

impl SenderConfig {
    /// Build a configuration from raw JSON texts (signal map required, gear
    /// table optional).
    pub fn from_json(wheel_map: &str, gear_para: Option<&str>) -> Result<Self> {
        let map: WheelMapFile = serde_json::from_str(wheel_map)
            .map_err(|e| SenderError::config(format!("invalid signal map JSON: {}", e)))?;

        let mut signals = Vec::with_capacity(map.properties.len());
        let mut seen = HashSet::new();
        for raw in map.properties {
            let descriptor = raw.into_descriptor()?;
            if !seen.insert(descriptor.name.clone()) {
                return Err(SenderError::config(format!(
                    "duplicate signal name {:?}",
                    descriptor.name
                )));
            }
            signals.push(descriptor);
        }

        let mut gear_ratio = GearRatioTable::default();
        if let Some(text) = gear_para {
            let file: GearParaFile = serde_json::from_str(text)
                .map_err(|e| SenderError::config(format!("invalid gear table JSON: {}", e)))?;
            for entry in file.entries {
                gear_ratio.set(&entry.pos, entry.val);
            }
        }

        Ok(Self { signals, gear_ratio })
    }

    /// Load from the top-level file referencing the signal map and gear
    /// table by path. Relative paths resolve against the top-level file's
    /// directory.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let top_text = std::fs::read_to_string(path).map_err(|e| {
            SenderError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        let top: TopLevelFile = serde_json::from_str(&top_text)
            .map_err(|e| SenderError::config(format!("invalid config JSON: {}", e)))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let resolve = |p: &str| {
            let p = Path::new(p);
            if p.is_absolute() {
                p.to_path_buf()
            } else {
                base.join(p)
            }
        };

        let map_path = resolve(&top.wheel_map);
        let wheel_map = std::fs::read_to_string(&map_path).map_err(|e| {
            SenderError::config(format!("cannot read signal map {}: {}", map_path.display(), e))
        })?;

        let gear_para = match &top.gear_para {
            Some(p) => {
                let gear_path = resolve(p);
                Some(std::fs::read_to_string(&gear_path).map_err(|e| {
                    SenderError::config(format!(
                        "cannot read gear table {}: {}",
                        gear_path.display(),
                        e
                    ))
                })?)
            }
            None => None,
        };

        Self::from_json(&wheel_map, gear_para.as_deref())
    }
}
