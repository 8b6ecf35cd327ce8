use ttflow_core::{PacketBuf, is_trdp, is_tt, shim, trdp_to_tt, tt_to_trdp};

use super::CommandResult;

pub fn run(hex: &str, encap: bool, decap: bool) -> CommandResult {
    let frame = parse_hex(hex)?;
    let mut pkt = PacketBuf::from_frame(&frame);

    let class = if is_tt(&pkt) {
        "TT"
    } else if is_trdp(&pkt) {
        "TRDP"
    } else {
        "other"
    };
    println!("Frame: {} bytes, class {class}", pkt.len());
    if let Ok(header) = shim::shim_header(&pkt) {
        println!("Shim: flow_id={} len={}", header.flow_id, header.len);
    }

    if encap {
        trdp_to_tt(&mut pkt)?;
        let header = shim::shim_header(&pkt)?;
        println!("Encapsulated: flow_id={} len={}", header.flow_id, header.len);
        println!("{}", format_hex(pkt.frame()));
    } else if decap {
        tt_to_trdp(&mut pkt)?;
        println!("Decapsulated: {} bytes", pkt.len());
        println!("{}", format_hex(pkt.frame()));
    }
    Ok(())
}

/// Parse hex bytes, ignoring whitespace. Accepts tcpdump -xx style dumps.
fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".into());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid hex at offset {i}"))
        })
        .collect()
}

fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(if i % 16 == 0 { '\n' } else { ' ' });
        }
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_hex_ignores_whitespace() {
        assert_eq!(parse_hex("01 02\n0a").unwrap(), vec![1, 2, 10]);
        assert_eq!(parse_hex("ffee").unwrap(), vec![0xff, 0xee]);
    }

    #[test]
    fn parse_hex_rejects_bad_input() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn format_hex_wraps_lines() {
        let out = format_hex(&[0xab; 20]);
        assert_eq!(out.lines().count(), 2);
        assert!(out.starts_with("ab ab"));
    }
}
