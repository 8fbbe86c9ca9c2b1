use anyhow::Result;
use tinytrace::runtime::{iter_programs, program_count};

/// List command: show all registered programs.
pub fn list_programs() -> Result<()> {
    let count = program_count();
    println!("Registered programs: {}", count);
    println!();

    if count == 0 {
        println!("No programs registered. Make sure to use the #[program] macro.");
        return Ok(());
    }

    let mut programs: Vec<_> = iter_programs().collect();
    programs.sort_by_key(|program| program.name());

    for program in programs {
        println!("  {}({})", program.name(), program.metadata.params.join(", "));
        if let Some(desc) = program.metadata.description {
            println!("    Description: {}", desc);
        }
        println!("    Source: {}", program.metadata.source);
        println!();
    }

    Ok(())
}
