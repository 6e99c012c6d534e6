use crate::command::{CommandOutput, CommandRunner};
use crate::report::{PciDevice, UsbDevice};
use tracing::{debug, warn};

pub async fn collect_pci(runner: &CommandRunner) -> Option<Vec<PciDevice>> {
    let out = run_tool(runner, "lspci", &["-mm", "-nn"]).await?;
    Some(out.text().lines().filter_map(parse_lspci_line).collect())
}

pub async fn collect_usb(runner: &CommandRunner) -> Option<Vec<UsbDevice>> {
    let out = run_tool(runner, "lsusb", &[]).await?;
    Some(out.text().lines().filter_map(parse_lsusb_line).collect())
}

/// The `blockdevices` array of `lsblk -J`, untouched.
pub async fn collect_block_devices(runner: &CommandRunner) -> Option<serde_json::Value> {
    let out = run_tool(runner, "lsblk", &["-J"]).await?;
    parse_lsblk(&out.stdout)
}

async fn run_tool(runner: &CommandRunner, program: &str, args: &[&str]) -> Option<CommandOutput> {
    if !runner.has(program) {
        debug!(program, "tool not installed, skipping");
        return None;
    }
    match runner.run(program, args).await {
        Ok(out) if out.success => Some(out),
        Ok(_) => {
            debug!(program, "tool exited unsuccessfully, skipping");
            None
        }
        Err(err) => {
            warn!(error = %err, "device listing failed");
            None
        }
    }
}

/// One line of `lspci -mm -nn`:
/// `00:02.0 "VGA compatible controller [0300]" "Intel Corporation [8086]" "UHD Graphics 620 [5917]" -r07 "Lenovo [17aa]" "ThinkPad [2258]"`
fn parse_lspci_line(line: &str) -> Option<PciDevice> {
    let tokens = tokenize_machine_readable(line);
    let (slot, rest) = tokens.split_first()?;
    if slot.quoted {
        return None;
    }
    let mut fields = rest.iter().filter(|t| t.quoted).map(|t| t.text.as_str());
    let class = fields.next()?.to_string();
    let vendor = fields.next()?.to_string();
    let device = fields.next()?.to_string();
    let subsystem_vendor = fields.next().filter(|s| !s.is_empty()).map(str::to_string);
    let subsystem_device = fields.next().filter(|s| !s.is_empty()).map(str::to_string);

    let id = match (bracketed_id(&vendor), bracketed_id(&device)) {
        (Some(v), Some(d)) => Some(format!("{v}:{d}")),
        _ => None,
    };

    Some(PciDevice {
        slot: slot.text.clone(),
        class,
        vendor,
        device,
        id,
        subsystem_vendor,
        subsystem_device,
    })
}

struct Token {
    text: String,
    quoted: bool,
}

fn tokenize_machine_readable(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.trim().chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '"' {
            chars.next();
            let text: String = chars.by_ref().take_while(|&c| c != '"').collect();
            tokens.push(Token { text, quoted: true });
        } else {
            let mut text = String::new();
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                text.push(c);
                chars.next();
            }
            tokens.push(Token {
                text,
                quoted: false,
            });
        }
    }
    tokens
}

/// `"Intel Corporation [8086]"` -> `8086`
fn bracketed_id(field: &str) -> Option<&str> {
    let inner = field.trim_end().strip_suffix(']')?;
    let start = inner.rfind('[')?;
    Some(&inner[start + 1..])
}

/// `Bus 002 Device 001: ID 1d6b:0003 Linux Foundation 3.0 root hub`
fn parse_lsusb_line(line: &str) -> Option<UsbDevice> {
    let rest = line.trim().strip_prefix("Bus ")?;
    let (bus, rest) = rest.split_once(' ')?;
    let rest = rest.trim_start().strip_prefix("Device ")?;
    let (device, rest) = rest.split_once(':')?;
    let rest = rest.trim_start().strip_prefix("ID ")?;
    let (id, description) = match rest.split_once(' ') {
        Some((id, description)) => (id, description.trim()),
        None => (rest.trim(), ""),
    };

    Some(UsbDevice {
        bus: bus.to_string(),
        device: device.trim().to_string(),
        id: id.to_string(),
        description: description.to_string(),
    })
}

fn parse_lsblk(stdout: &[u8]) -> Option<serde_json::Value> {
    let mut value: serde_json::Value = match serde_json::from_slice(stdout) {
        Ok(v) => v,
        Err(err) => {
            warn!(error = %err, "lsblk output is not valid JSON");
            return None;
        }
    };
    value.get_mut("blockdevices").map(serde_json::Value::take)
}
