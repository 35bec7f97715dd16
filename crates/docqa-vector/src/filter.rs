//! Translate metadata filters into Lance SQL predicates.
use docqa_core::types::{MetadataFilter, FILENAME_ATTRIBUTE};
use docqa_core::{Error, Result};

fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `None` means the filter can match nothing (an empty `in` list).
pub fn to_predicate(filter: &MetadataFilter) -> Result<Option<String>> {
    if filter.attribute() != FILENAME_ATTRIBUTE {
        return Err(Error::InvalidInput(format!("cannot filter on attribute '{}'", filter.attribute())));
    }
    Ok(match filter {
        MetadataFilter::Eq { attribute, value } => Some(format!("{attribute} = {}", quote(value))),
        MetadataFilter::In { values, .. } if values.is_empty() => None,
        MetadataFilter::In { attribute, values } => {
            let list = values.iter().map(|v| quote(v)).collect::<Vec<_>>().join(", ");
            Some(format!("{attribute} IN ({list})"))
        }
    })
}
