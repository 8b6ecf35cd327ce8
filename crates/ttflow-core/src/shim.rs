//! TT/TRDP packet classification and shim encapsulation.
//!
//! A TRDP packet is an IPv4/UDP datagram addressed to [`TT_PORT`] whose
//! first two payload octets carry the flow id. On the wire, a TT packet is
//! the same frame with EtherType [`ETH_P_TT`] and a 4-byte shim between the
//! Ethernet and IP headers:
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           flow_id             |              len              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Both fields are big-endian. `len` is the total frame length excluding
//! the 4-byte frame check sequence, truncated to 16 bits. Classification
//! never panics on short frames; transforms leave the packet untouched on
//! error.

use crate::error::{Error, Result};
use crate::packet::PacketBuf;

/// UDP destination port that marks a datagram as TRDP.
pub const TT_PORT: u16 = 63000;
/// EtherType of shim-encapsulated TT frames.
pub const ETH_P_TT: u16 = 0x88D7;
/// EtherType of plain IPv4 frames.
pub const ETH_P_IPV4: u16 = 0x0800;
/// Shim header length in bytes.
pub const SHIM_LEN: usize = 4;

const IPPROTO_UDP: u8 = 17;
const IPV4_MIN_HLEN: usize = 20;
const UDP_HLEN: usize = 8;

/// The 4-byte `(flow_id, len)` shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShimHeader {
    pub flow_id: u16,
    pub len: u16,
}

impl ShimHeader {
    /// Parse a shim from its first four bytes.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < SHIM_LEN {
            return Err(Error::Truncated {
                needed: SHIM_LEN,
                len: bytes.len(),
            });
        }
        Ok(Self {
            flow_id: u16::from_be_bytes([bytes[0], bytes[1]]),
            len: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    fn write(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.flow_id.to_be_bytes());
        out[2..4].copy_from_slice(&self.len.to_be_bytes());
    }
}

fn ethertype(pkt: &PacketBuf) -> Option<u16> {
    let frame = pkt.frame();
    let mac_len = pkt.mac_len();
    if frame.len() < mac_len {
        return None;
    }
    Some(u16::from_be_bytes([frame[mac_len - 2], frame[mac_len - 1]]))
}

fn set_ethertype(pkt: &mut PacketBuf, ethertype: u16) {
    let mac_len = pkt.mac_len();
    pkt.frame_mut()[mac_len - 2..mac_len].copy_from_slice(&ethertype.to_be_bytes());
}

/// Offset of the UDP header inside an IPv4 frame, derived from the IHL
/// field. `None` when the frame is too short or the header length is bogus.
fn transport_offset(pkt: &PacketBuf) -> Option<usize> {
    let frame = pkt.frame();
    let net = pkt.mac_len();
    if frame.len() < net + IPV4_MIN_HLEN {
        return None;
    }
    let ihl = usize::from(frame[net] & 0x0f) * 4;
    if ihl < IPV4_MIN_HLEN {
        return None;
    }
    Some(net + ihl)
}

/// True iff the packet is a raw TRDP datagram: IPv4, UDP, destination port
/// [`TT_PORT`].
pub fn is_trdp(pkt: &PacketBuf) -> bool {
    if ethertype(pkt) != Some(ETH_P_IPV4) {
        return false;
    }
    let frame = pkt.frame();
    let net = pkt.mac_len();
    if frame.len() < net + IPV4_MIN_HLEN || frame[net + 9] != IPPROTO_UDP {
        return false;
    }
    let Some(transport) = transport_offset(pkt) else {
        return false;
    };
    if frame.len() < transport + UDP_HLEN {
        return false;
    }
    u16::from_be_bytes([frame[transport + 2], frame[transport + 3]]) == TT_PORT
}

/// True iff the packet already carries the TT shim EtherType.
pub fn is_tt(pkt: &PacketBuf) -> bool {
    ethertype(pkt) == Some(ETH_P_TT)
}

/// Read the shim of a TT packet.
pub fn shim_header(pkt: &PacketBuf) -> Result<ShimHeader> {
    if !is_tt(pkt) {
        return Err(Error::NotTt);
    }
    ShimHeader::parse(&pkt.frame()[pkt.mac_len()..])
}

/// Encapsulate a TRDP packet in place: push the shim between the Ethernet
/// and IP headers and rewrite the EtherType to [`ETH_P_TT`].
///
/// The flow id comes from the first two octets of the UDP payload. The
/// buffer is reallocated when it lacks [`SHIM_LEN`] bytes of headroom. On
/// error the packet is unchanged.
pub fn trdp_to_tt(pkt: &mut PacketBuf) -> Result<()> {
    if !is_trdp(pkt) {
        return Err(Error::NotTrdp);
    }
    // is_trdp proved the UDP header is in range.
    let Some(transport) = transport_offset(pkt) else {
        return Err(Error::NotTrdp);
    };
    let payload = transport + UDP_HLEN;
    let frame = pkt.frame();
    if frame.len() < payload + 2 {
        return Err(Error::Truncated {
            needed: payload + 2,
            len: frame.len(),
        });
    }
    let flow_id = u16::from_be_bytes([frame[payload], frame[payload + 1]]);

    let mac_len = pkt.mac_len();
    pkt.grow_head(SHIM_LEN);
    let total_len = pkt.len();
    let frame = pkt.frame_mut();
    // Move the link header forward so the shim lands right behind it.
    frame.copy_within(SHIM_LEN..SHIM_LEN + mac_len, 0);
    let shim = ShimHeader {
        flow_id,
        // Total frame length excluding the frame check sequence.
        len: (total_len - SHIM_LEN) as u16,
    };
    shim.write(&mut frame[mac_len..mac_len + SHIM_LEN]);
    set_ethertype(pkt, ETH_P_TT);
    Ok(())
}

/// Decapsulate a TT packet in place: discard the shim and restore the IPv4
/// EtherType. On error the packet is unchanged.
pub fn tt_to_trdp(pkt: &mut PacketBuf) -> Result<()> {
    if !is_tt(pkt) {
        return Err(Error::NotTt);
    }
    let mac_len = pkt.mac_len();
    pkt.ensure_writable(mac_len + SHIM_LEN)?;

    // Move the link header back over the shim, then give the bytes up.
    pkt.frame_mut().copy_within(0..mac_len, SHIM_LEN);
    pkt.shrink_head(SHIM_LEN);
    set_ethertype(pkt, ETH_P_IPV4);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::ETH_HLEN;

    /// Build a minimal IPv4/UDP frame carrying `flow_id` in the first two
    /// payload octets.
    fn trdp_frame(flow_id: u16, dport: u16, payload_tail: &[u8]) -> Vec<u8> {
        let mut f = Vec::new();
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 1]); // dst mac
        f.extend_from_slice(&[0x02, 0, 0, 0, 0, 2]); // src mac
        f.extend_from_slice(&ETH_P_IPV4.to_be_bytes());

        let udp_len = (UDP_HLEN + 2 + payload_tail.len()) as u16;
        let ip_len = 20 + udp_len;
        f.push(0x45); // version 4, ihl 5
        f.push(0);
        f.extend_from_slice(&ip_len.to_be_bytes());
        f.extend_from_slice(&[0, 0, 0, 0]); // id, flags/frag
        f.push(64); // ttl
        f.push(IPPROTO_UDP);
        f.extend_from_slice(&[0, 0]); // checksum
        f.extend_from_slice(&[10, 0, 0, 1]);
        f.extend_from_slice(&[10, 0, 0, 2]);

        f.extend_from_slice(&40000u16.to_be_bytes()); // sport
        f.extend_from_slice(&dport.to_be_bytes());
        f.extend_from_slice(&udp_len.to_be_bytes());
        f.extend_from_slice(&[0, 0]); // checksum
        f.extend_from_slice(&flow_id.to_be_bytes());
        f.extend_from_slice(payload_tail);
        f
    }

    #[test]
    fn classifies_trdp() {
        let pkt = PacketBuf::from_frame(&trdp_frame(7, TT_PORT, b"data"));
        assert!(is_trdp(&pkt));
        assert!(!is_tt(&pkt));
    }

    #[test]
    fn wrong_port_is_not_trdp() {
        let pkt = PacketBuf::from_frame(&trdp_frame(7, 5353, b"data"));
        assert!(!is_trdp(&pkt));
    }

    #[test]
    fn short_frames_classify_false_without_panicking() {
        let full = trdp_frame(7, TT_PORT, b"");
        for cut in 0..full.len() {
            let pkt = PacketBuf::from_frame(&full[..cut]);
            assert!(!is_trdp(&pkt), "truncation at {cut} classified as TRDP");
            assert!(!is_tt(&pkt));
        }
    }

    #[test]
    fn encap_pushes_shim_and_rewrites_ethertype() {
        let raw = trdp_frame(0x0102, TT_PORT, b"xy");
        let mut pkt = PacketBuf::from_frame(&raw);
        trdp_to_tt(&mut pkt).unwrap();

        assert!(is_tt(&pkt));
        assert_eq!(pkt.len(), raw.len() + SHIM_LEN);

        // Link header moved forward intact.
        assert_eq!(&pkt.frame()[..12], &raw[..12]);

        let shim = shim_header(&pkt).unwrap();
        assert_eq!(shim.flow_id, 0x0102);
        assert_eq!(usize::from(shim.len), raw.len());

        // Network layer onward is untouched.
        assert_eq!(&pkt.frame()[ETH_HLEN + SHIM_LEN..], &raw[ETH_HLEN..]);
    }

    #[test]
    fn encap_without_headroom_reallocates() {
        let raw = trdp_frame(3, TT_PORT, b"");
        let mut pkt = PacketBuf::with_headroom(&raw, 0);
        trdp_to_tt(&mut pkt).unwrap();
        assert_eq!(shim_header(&pkt).unwrap().flow_id, 3);
    }

    #[test]
    fn encap_rejects_non_trdp() {
        let raw = trdp_frame(3, 80, b"");
        let mut pkt = PacketBuf::from_frame(&raw);
        assert_eq!(trdp_to_tt(&mut pkt), Err(Error::NotTrdp));
        assert_eq!(pkt.frame(), &raw[..]);
    }

    #[test]
    fn decap_restores_original_bytes() {
        let raw = trdp_frame(42, TT_PORT, b"payload");
        let mut pkt = PacketBuf::from_frame(&raw);
        trdp_to_tt(&mut pkt).unwrap();
        tt_to_trdp(&mut pkt).unwrap();
        assert_eq!(pkt.frame(), &raw[..]);
        assert!(is_trdp(&pkt));
    }

    #[test]
    fn encap_after_decap_restores_tt_form() {
        let raw = trdp_frame(42, TT_PORT, b"payload");
        let mut pkt = PacketBuf::from_frame(&raw);
        trdp_to_tt(&mut pkt).unwrap();
        let tt_form = pkt.frame().to_vec();

        tt_to_trdp(&mut pkt).unwrap();
        trdp_to_tt(&mut pkt).unwrap();
        assert_eq!(pkt.frame(), &tt_form[..]);
    }

    #[test]
    fn decap_rejects_plain_ipv4() {
        let raw = trdp_frame(1, TT_PORT, b"");
        let mut pkt = PacketBuf::from_frame(&raw);
        assert_eq!(tt_to_trdp(&mut pkt), Err(Error::NotTt));
    }

    #[test]
    fn decap_rejects_truncated_tt_frame() {
        let raw = trdp_frame(1, TT_PORT, b"");
        let mut pkt = PacketBuf::from_frame(&raw);
        trdp_to_tt(&mut pkt).unwrap();

        // Keep only the link header and half the shim.
        let mut cut = PacketBuf::from_frame(&pkt.frame()[..ETH_HLEN + 2]);
        assert!(matches!(
            tt_to_trdp(&mut cut),
            Err(Error::Truncated { .. })
        ));
    }

    #[test]
    fn shim_parse_needs_four_bytes() {
        assert!(matches!(
            ShimHeader::parse(&[0, 1, 2]),
            Err(Error::Truncated { needed: 4, len: 3 })
        ));
    }
}
