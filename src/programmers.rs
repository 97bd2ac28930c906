//! Programmer registration and dispatch
//!
//! This module provides a registry of the compiled-in programmers and opens
//! the one named on the command line as a `Transport`.

use osccal_core::transport::Transport;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "ftdi")]
    programmers.push(ProgrammerInfo {
        name: "ftdi",
        aliases: &["ft2232h"],
        description: "FT2232H calibration cable, 0403:6010 channel A (latency=<ms>,timeout=<ms>)",
    });

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Simulated target (response=<lock|drift|silent|fail>,ready-after=<N>,fail-write=<N>)",
    });

    programmers
}

/// Generate help text listing all available programmers
pub fn programmer_help() -> String {
    let programmers = available_programmers();

    if programmers.is_empty() {
        return "No programmers available (recompile with programmer features enabled)".to_string();
    }

    let mut help = String::from("Available programmers:\n");

    for p in &programmers {
        help.push_str(&format!("  {:8} - {}\n", p.name, p.description));
        if !p.aliases.is_empty() {
            help.push_str(&format!("  {:8}   aliases: {}\n", "", p.aliases.join(", ")));
        }
    }

    help
}

/// Resolve a programmer name or alias to its primary name
pub fn find_programmer(name: &str) -> Option<&'static str> {
    available_programmers()
        .into_iter()
        .find(|p| p.name == name || p.aliases.contains(&name))
        .map(|p| p.name)
}

/// Open the programmer described by `programmer`
///
/// The programmer string can be just the name (e.g., "ftdi") or include
/// parameters (e.g., "ftdi:latency=16").
#[allow(unused_variables)]
pub fn open_transport(programmer: &str) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let (name, options) = parse_programmer_string(programmer);

    let canonical_name = match find_programmer(name) {
        Some(n) => n,
        None => return Err(unknown_programmer_error(name)),
    };

    match canonical_name {
        #[cfg(feature = "ftdi")]
        "ftdi" => {
            use osccal_ftdi::{parse_options, FtdiTransport};

            log::info!("Opening FTDI programmer...");

            let config =
                parse_options(&options).map_err(|e| format!("Invalid FTDI parameters: {}", e))?;

            let transport = FtdiTransport::open(&config).map_err(|e| {
                format!(
                    "Failed to open FTDI device: {}\n\
                     Make sure the device is connected and you have permissions.\n\
                     You may need to unbind the kernel ftdi_sio driver:\n\
                     echo -n '<bus>-<port>' | sudo tee /sys/bus/usb/drivers/ftdi_sio/unbind",
                    e
                )
            })?;

            Ok(Box::new(transport))
        }

        #[cfg(feature = "dummy")]
        "dummy" => {
            use osccal_dummy::{parse_options, SimulatedTarget};

            let config =
                parse_options(&options).map_err(|e| format!("Invalid dummy parameters: {}", e))?;

            Ok(Box::new(SimulatedTarget::new(config)))
        }

        _ => Err(unknown_programmer_error(name)),
    }
}

/// Parse a programmer string into name and options
///
/// Format: "name" or "name:option1=value1,option2=value2"
pub fn parse_programmer_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    if let Some((name, opts)) = s.split_once(':') {
        let options: Vec<_> = opts
            .split(',')
            .filter_map(|opt| opt.split_once('='))
            .collect();
        (name, options)
    } else {
        (s, Vec::new())
    }
}

fn unknown_programmer_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown programmer: {}\n\n", name);
    msg.push_str(&programmer_help());
    msg.push_str("\nUse 'osccal list-programmers' for more details");
    msg.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_string() {
        assert_eq!(parse_programmer_string("ftdi"), ("ftdi", vec![]));
        assert_eq!(
            parse_programmer_string("dummy:response=drift,ready-after=3"),
            ("dummy", vec![("response", "drift"), ("ready-after", "3")])
        );
        // Options without a value are ignored
        assert_eq!(
            parse_programmer_string("ftdi:latency=16,verbose"),
            ("ftdi", vec![("latency", "16")])
        );
    }

    #[test]
    fn test_unknown_programmer() {
        assert!(find_programmer("ch341a").is_none());
        let err = open_transport("ch341a").err().map(|e| e.to_string());
        assert!(err.unwrap().starts_with("Unknown programmer: ch341a"));
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy() {
        assert_eq!(find_programmer("sim"), Some("dummy"));
        assert!(open_transport("dummy:response=fail").is_ok());
        assert!(open_transport("dummy:response=sometimes").is_err());
    }
}
