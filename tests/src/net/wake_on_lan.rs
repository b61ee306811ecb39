//! Wake-on-LAN

#[cfg(test)]
mod tests {
    use crate::mock::{lan_config, parse, MockNic, OWN_IP, OWN_MAC};
    use micronet::net::ethernet::MacAddress;
    use micronet::net::frame::{eth, ip, udp as layout};
    use micronet::net::ipv4::Ipv4Address;
    use micronet::net::udp;
    use micronet::net::wol::{MAGIC_PAYLOAD_LEN, WOL_PORT};
    use micronet::NetStack;

    #[test]
    fn test_magic_packet_needs_no_resolution() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        let sleeper = MacAddress::new([0x00, 0x1a, 0x2b, 0x3c, 0x4d, 0x5e]);

        stack.send_wol(&mut nic, &sleeper).unwrap();

        let sent = nic.last_sent().unwrap();
        assert_eq!(sent.len(), 144);
        let packet = parse(sent);
        assert_eq!(packet.mac_at(eth::DST_MAC), MacAddress::BROADCAST);
        assert_eq!(packet.mac_at(eth::SRC_MAC), OWN_MAC);
        assert_eq!(packet.ip_at(ip::SRC), OWN_IP);
        assert_eq!(packet.ip_at(ip::DST), Ipv4Address::BROADCAST);
        assert_eq!(udp::dst_port(&packet), WOL_PORT);

        let payload = udp::payload(&packet, sent.len());
        assert_eq!(payload.len(), MAGIC_PAYLOAD_LEN);
        assert_eq!(&payload[..6], &[0xFF; 6]);
        assert!(payload[6..]
            .chunks_exact(6)
            .all(|chunk| chunk == sleeper.as_bytes()));
        assert_eq!(packet.u16_at(layout::LEN) as usize, 8 + MAGIC_PAYLOAD_LEN);
    }
}
