//! Document validation logic.

use std::collections::HashSet;

use crate::schema::SystemDoc;

#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Duplicate name: {name} in {context}")]
    DuplicateName { name: String, context: String },

    #[error("Empty name in {context}")]
    EmptyName { context: String },

    #[error("Invalid value: {field} = {value} ({reason})")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Validate a system document before any entities are built from it.
///
/// Name-reference resolution is deliberately left to the linking pass; this
/// layer only rejects documents no linker could accept.
pub fn validate_system(doc: &SystemDoc) -> Result<(), ValidationError> {
    let mut names = HashSet::new();

    let mut check_name = |name: &str, context: &str| -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName {
                context: context.to_string(),
            });
        }
        if !names.insert(name.to_string()) {
            return Err(ValidationError::DuplicateName {
                name: name.to_string(),
                context: context.to_string(),
            });
        }
        Ok(())
    };

    for stock in &doc.stocks {
        check_name(&stock.name, "stocks")?;
        if let Some(max_level) = stock.max_level {
            validate_limit("max_level", &stock.name, max_level)?;
        }
    }
    for cloud in &doc.clouds {
        check_name(&cloud.name, "clouds")?;
    }
    for control in &doc.controls {
        check_name(&control.name, "controls")?;
    }
    for flow in &doc.flows {
        check_name(&flow.name, "flows")?;
        if let Some(max_capacity) = flow.max_capacity {
            validate_limit("max_capacity", &flow.name, max_capacity)?;
        }
    }

    Ok(())
}

fn validate_limit(field: &str, name: &str, value: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: format!("{name}.{field}"),
            value: value.to_string(),
            reason: "limit must be non-negative".to_string(),
        });
    }
    Ok(())
}
