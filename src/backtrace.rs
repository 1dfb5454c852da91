//! Symbolicated backtrace renderer — peripheral: this is not hard
//! engineering, it is a best-effort debugging aid that never fails
//! loudly.
//!
//! Return addresses are captured with the `backtrace` crate (the
//! idiomatic Rust source of raw frame addresses, replacing the libc
//! `backtrace()`/`backtrace_symbols()` pair `backtrace.c` calls
//! directly), then symbolicated by spawning `addr2line` (Linux) or
//! `atos` (macOS) against the running binary — exactly as `backtrace.c`
//! does via `popen`. Activation is gated on `RUST_BACKTRACE` being set;
//! any child-process or parsing failure degrades to a truncated or
//! empty string, never an `Err`.

use std::env;
use std::process::Command;

const MAX_BACKTRACE_ENTRIES: usize = 128;
const MAX_BACKTRACE_LEN: usize = 1024 * 1024;

/// Renders the current call stack as human-readable text, or returns an
/// empty string if `RUST_BACKTRACE` is unset/empty or symbolication is
/// unavailable.
pub fn render() -> String {
    match env::var_os("RUST_BACKTRACE") {
        Some(v) if !v.is_empty() => {}
        _ => return String::new(),
    }

    let binary = match env::current_exe() {
        Ok(p) => p,
        Err(_) => return String::new(),
    };
    let binary = match binary.to_str() {
        Some(s) => s.to_owned(),
        None => return String::new(),
    };

    let mut addrs: Vec<*mut std::ffi::c_void> = Vec::with_capacity(MAX_BACKTRACE_ENTRIES);
    backtrace::trace(|frame| {
        addrs.push(frame.ip());
        addrs.len() < MAX_BACKTRACE_ENTRIES
    });

    symbolicate(&binary, &addrs)
}

fn page_size() -> usize {
    let n = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if n > 0 {
        n as usize
    } else {
        4096
    }
}

#[cfg(target_os = "linux")]
fn symbolicate(binary: &str, addrs: &[*mut std::ffi::c_void]) -> String {
    let mut out = String::new();
    let mut len_sum = 0usize;
    let cap = 4 * page_size();
    let mut seen_main = false;

    'frames: for &addr in addrs {
        let address = (addr as usize).saturating_sub(8);
        let output = Command::new("addr2line")
            .args(["-f", "-e", binary, &format!("{address:x}")])
            .output();
        let output = match output {
            Ok(o) if o.status.success() => o,
            _ => continue,
        };
        let text = String::from_utf8_lossy(&output.stdout);

        for raw_line in text.split_inclusive('\n') {
            if raw_line.contains(".rs:") {
                len_sum += raw_line.len();
                if len_sum >= cap {
                    break 'frames;
                }
                if seen_main {
                    out.push_str(raw_line.trim_end_matches('\n'));
                    break 'frames;
                }
                out.push_str(raw_line);
            } else if is_symbol_name_line(raw_line) {
                let mut line = raw_line.to_string();
                if line.ends_with('\n') {
                    line.pop();
                    line.push(' ');
                }
                len_sum += line.len();
                if len_sum >= cap {
                    break 'frames;
                }
                out.push_str(&line);
                if line == "main " {
                    seen_main = true;
                }
            }
        }
    }

    out
}

/// A symbol-name line from `addr2line -f` output: no leading digit, and
/// every character is alphanumeric, `_`, or the trailing newline.
fn is_symbol_name_line(line: &str) -> bool {
    let mut chars = line.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => return false,
        None => return true,
        _ => {}
    }
    line.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '\n')
}

#[cfg(target_os = "macos")]
fn symbolicate(binary: &str, addrs: &[*mut std::ffi::c_void]) -> String {
    use std::mem;

    let mut out = String::new();
    let mut len_sum = 0usize;

    for &addr in addrs {
        let mut info: libc::Dl_info = unsafe { mem::zeroed() };
        if unsafe { libc::dladdr(addr, &mut info) } == 0 {
            continue;
        }

        let base: u64 = 0x1_0000_0000;
        let mut resolved = base
            .wrapping_add(info.dli_saddr as u64)
            .wrapping_sub(info.dli_fbase as u64);
        resolved = resolved.wrapping_add((addr as u64).wrapping_sub(info.dli_saddr as u64));
        resolved = resolved.wrapping_sub(4);

        let output = Command::new("atos")
            .args([
                "-fullPath",
                "-o",
                binary,
                "-l",
                "0x100000000",
                &format!("0x{resolved:x}"),
            ])
            .output();
        let output = match output {
            Ok(o) if o.status.success() => o,
            _ => continue,
        };

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            // Mirrors `backtrace.c` skipping its own capture frame.
            if line.starts_with("anchor_io::backtrace::render") {
                continue;
            }
            len_sum += line.len() + 1;
            if len_sum >= MAX_BACKTRACE_LEN {
                return out;
            }
            out.push_str(line);
            out.push('\n');
        }
    }

    out
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn symbolicate(_binary: &str, _addrs: &[*mut std::ffi::c_void]) -> String {
    warn!("unsupported OS: cannot build backtraces");
    String::new()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disabled_without_env_var_is_empty() {
        let had = env::var_os("RUST_BACKTRACE");
        env::remove_var("RUST_BACKTRACE");
        assert_eq!(render(), "");
        if let Some(v) = had {
            env::set_var("RUST_BACKTRACE", v);
        }
    }

    #[test]
    fn symbol_name_line_classifier() {
        assert!(is_symbol_name_line("main\n"));
        assert!(is_symbol_name_line("anchor_io::backtrace::render\n"));
        assert!(!is_symbol_name_line("0x00005612a1b2c3d4\n"));
        assert!(!is_symbol_name_line("src/main.rs:12\n"));
    }
}
