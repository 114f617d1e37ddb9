//! `gradwise tools`: list the registered tools and their parameters.

use gradwise_tools::{RecordBook, default_registry};
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry = default_registry(Arc::new(RecordBook::in_memory()));

    println!("Available tools");
    println!("===============");
    for def in registry.definitions() {
        println!();
        println!("  {}", def.name);
        println!("    {}", def.description);
        if let Some(props) = def.parameters.get("properties").and_then(|p| p.as_object()) {
            let required: Vec<&str> = def
                .parameters
                .get("required")
                .and_then(|r| r.as_array())
                .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
                .unwrap_or_default();
            let params: Vec<String> = props
                .keys()
                .map(|k| if required.contains(&k.as_str()) { format!("{k}*") } else { k.clone() })
                .collect();
            println!("    params: {}", params.join(", "));
        }
    }
    Ok(())
}
