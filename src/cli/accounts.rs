use comfy_table::{Cell, Table};

use crate::adapters::ALL_ADAPTERS;
use crate::error::Result;
use crate::settings::Settings;

pub fn list(settings: &Settings) -> Result<()> {
    let mut table = Table::new();
    table.set_header(vec!["Key", "Name", "Columns"]);
    for kind in ALL_ADAPTERS {
        let columns = match settings.layout_for(kind.key()) {
            Some(layout) => format!("{} (configured)", layout.join(", ")),
            None => kind.expected_columns().join(", "),
        };
        table.add_row(vec![Cell::new(kind.key()), Cell::new(kind.name()), Cell::new(columns)]);
    }
    println!("Supported accounts\n{table}");
    println!("Raw exports are named YYYY-MM-DD_to_YYYY-MM-DD_<key>.csv");
    Ok(())
}
