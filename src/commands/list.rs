//! List commands implementation

use crate::programmers;

/// List all supported programmers
pub fn list_programmers() {
    println!("Supported programmers:");
    println!();
    for p in programmers::available_programmers() {
        println!("  {:8} - {}", p.name, p.description);
    }
}

/// List attached FTDI adapters
#[cfg(feature = "ftdi")]
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = osccal_ftdi::list_devices()?;

    if devices.is_empty() {
        println!("No FTDI adapters found");
        return Ok(());
    }

    println!("FTDI adapters:");
    println!();
    for dev in &devices {
        println!("  {}", dev);
    }
    Ok(())
}

/// List attached FTDI adapters
#[cfg(not(feature = "ftdi"))]
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    Err("FTDI support not compiled in (enable the 'ftdi' feature)".into())
}
