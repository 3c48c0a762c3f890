//! Raw access to the `Singletons` block of `world.json`.
//!
//! Everything that knows service and field names of the game's world
//! layout goes through here.

use serde_json::{Map, Value};
use timber_common::{GridDims, TimberError, TimberResult};

/// Name of the world section inside the container.
pub const WORLD_ENTRY: &str = "world.json";
/// Top-level member holding the game services.
pub const SINGLETONS: &str = "Singletons";
/// Top-level member holding the game version string.
pub const GAME_VERSION: &str = "GameVersion";
/// Top-level member holding the save timestamp.
pub const TIMESTAMP: &str = "Timestamp";
/// Largest map accepted, in tiles.
pub const MAX_MAP_TILES: usize = 1 << 24;

fn section(service: &str, field: &str) -> String {
    format!("{service}.{field}")
}

/// Looks up a service object.
pub(crate) fn service<'a>(
    singletons: &'a Map<String, Value>,
    name: &str,
) -> TimberResult<&'a Map<String, Value>> {
    singletons
        .get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| TimberError::corrupt(name, "service is missing"))
}

fn field<'a>(singletons: &'a Map<String, Value>, service_name: &str, name: &str) -> TimberResult<&'a Value> {
    service(singletons, service_name)?
        .get(name)
        .ok_or_else(|| TimberError::corrupt(section(service_name, name), "field is missing"))
}

/// Reads a non-negative whole number.
pub(crate) fn read_u32(
    singletons: &Map<String, Value>,
    service_name: &str,
    name: &str,
) -> TimberResult<u32> {
    let value = field(singletons, service_name, name)?;
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        })
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            TimberError::corrupt(
                section(service_name, name),
                format!("expected a non-negative integer, found {value}"),
            )
        })
}

/// Reads a boolean flag.
pub(crate) fn read_bool(
    singletons: &Map<String, Value>,
    service_name: &str,
    name: &str,
) -> TimberResult<bool> {
    let value = field(singletons, service_name, name)?;
    value.as_bool().ok_or_else(|| {
        TimberError::corrupt(
            section(service_name, name),
            format!("expected a boolean, found {value}"),
        )
    })
}

/// Overwrites a whole number field.
pub(crate) fn write_u32(
    singletons: &mut Map<String, Value>,
    service_name: &str,
    name: &str,
    value: u32,
) -> TimberResult<()> {
    let service = singletons
        .get_mut(service_name)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| TimberError::corrupt(service_name, "service is missing"))?;
    service.insert(name.to_string(), Value::from(value));
    Ok(())
}

/// Reads the map dimensions from `MapSize.Size`.
pub(crate) fn read_dims(singletons: &Map<String, Value>) -> TimberResult<GridDims> {
    let size = service(singletons, "MapSize")?
        .get("Size")
        .and_then(Value::as_object)
        .ok_or_else(|| TimberError::corrupt("MapSize.Size", "field is missing"))?;
    let axis = |name: &str| -> TimberResult<usize> {
        size.get(name)
            .and_then(Value::as_u64)
            .filter(|n| *n > 0)
            .map(|n| n as usize)
            .ok_or_else(|| {
                TimberError::corrupt(
                    format!("MapSize.Size.{name}"),
                    "expected a positive integer",
                )
            })
    };
    let width = axis("X")?;
    let height = axis("Y")?;
    let dims = GridDims::new(height, width);
    match dims.checked_len() {
        Some(tiles) if tiles <= MAX_MAP_TILES => Ok(dims),
        _ => Err(TimberError::corrupt(
            "MapSize.Size",
            format!("{width}x{height} exceeds the {MAX_MAP_TILES} tile limit"),
        )),
    }
}

/// Reads a space separated float array stored as `{ "Array": "..." }`.
///
/// Returns `Ok(None)` when the service is absent and `required` is false.
pub(crate) fn read_grid(
    singletons: &Map<String, Value>,
    service_name: &str,
    name: &str,
    dims: GridDims,
    required: bool,
) -> TimberResult<Option<Vec<f64>>> {
    if !required && !singletons.contains_key(service_name) {
        return Ok(None);
    }
    let label = section(service_name, name);
    let text = field(singletons, service_name, name)?
        .get("Array")
        .and_then(Value::as_str)
        .ok_or_else(|| TimberError::corrupt(&label, "expected an Array string"))?;

    let values = text
        .split_whitespace()
        .map(|token| {
            // Some maps write integral values with a bare trailing dot
            let token = token.trim_end_matches('.');
            token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| TimberError::corrupt(&label, format!("invalid value '{token}'")))
        })
        .collect::<TimberResult<Vec<_>>>()?;

    if values.len() != dims.len() {
        return Err(TimberError::corrupt(
            label,
            format!(
                "expected {} values for a {}x{} map, found {}",
                dims.len(),
                dims.cols,
                dims.rows,
                values.len()
            ),
        ));
    }
    Ok(Some(values))
}
