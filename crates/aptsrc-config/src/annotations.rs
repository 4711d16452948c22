use documented::{Documented, DocumentedFields};
use serde::Serialize;
use toml_edit::{DocumentMut, Table};
use tracing::warn;

use crate::error::{ConfigError, Result};

/// Renders documentation text as a block of TOML comment lines.
pub fn doc_comment(docs: &str) -> String {
    docs.lines()
        .map(|line| {
            if line.is_empty() {
                "#\n".to_string()
            } else {
                format!("# {line}\n")
            }
        })
        .collect()
}

/// Puts each field's doc comment above its key in `table`.
///
/// Keys without field documentation on `T` are left alone with a warning.
pub fn annotate_table<T: DocumentedFields>(table: &mut Table) -> Result<()> {
    let mut first = true;

    for (mut key, item) in table.iter_mut() {
        let name = key.get().to_string();
        if item.is_none() {
            return Err(ConfigError::UnexpectedTomlItem(name));
        }

        let Ok(docs) = T::get_field_docs(&name) else {
            warn!("No documentation found for config key '{}'", name);
            continue;
        };

        let separator = if first { "" } else { "\n" };
        key.leaf_decor_mut()
            .set_prefix(format!("{separator}{}", doc_comment(docs)));
        first = false;
    }

    Ok(())
}

/// Serializes `value` to TOML with its type and field docs as comments.
pub fn annotated_toml<T>(value: &T) -> Result<String>
where
    T: Serialize + Documented + DocumentedFields,
{
    let mut doc = toml::to_string_pretty(value)?.parse::<DocumentMut>()?;
    annotate_table::<T>(doc.as_table_mut())?;
    Ok(format!("{}\n{doc}", doc_comment(T::DOCS)))
}
