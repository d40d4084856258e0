//! `talkbot tools`: print the tool schema list sent to the model.

use std::sync::Arc;
use talkbot_core::alert::AlertSlot;
use talkbot_memory::InMemoryStore;
use talkbot_scheduler::Scheduler;

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    let registry =
        talkbot_tools::default_registry(Scheduler::new(AlertSlot::new()), Arc::new(InMemoryStore::new()));

    println!();
    for def in registry.definitions() {
        let params: Vec<String> = def
            .parameters
            .iter()
            .map(|p| {
                let optional = if p.required { "" } else { "?" };
                format!("{}{optional}: {}", p.name, p.schema_type)
            })
            .collect();
        println!("  {}({})", def.name, params.join(", "));
        println!("      {}", def.description);
    }
    println!();
    println!("  {} tools", registry.len());
    Ok(())
}
