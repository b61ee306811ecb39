//! UDP listeners, replies and client sends

#[cfg(test)]
mod tests {
    use crate::mock::{lan_config, parse, MockNic, RemoteHost, OWN_IP, OWN_MAC};
    use micronet::net::checksum::{verify_range, ChecksumKind};
    use micronet::net::ethernet::MacAddress;
    use micronet::net::frame::{eth, ip, udp as layout};
    use micronet::net::ipv4::Ipv4Address;
    use micronet::net::udp::{UdpRequest, MAX_LISTENERS, MAX_PAYLOAD};
    use micronet::{Dispatch, NetError, NetStack};

    fn client() -> RemoteHost {
        RemoteHost::new(
            MacAddress::new([0x0a, 0x00, 0x27, 0x00, 0x00, 0x07]),
            Ipv4Address::new(192, 168, 1, 42),
        )
    }

    fn reply_pong(request: &mut UdpRequest<'_>) {
        assert_eq!(request.payload(), b"ping");
        request.reply(b"pong").unwrap();
    }

    fn reply_oversized(request: &mut UdpRequest<'_>) {
        request.reply(&[0x55; 300]).unwrap();
    }

    fn ignore(_request: &mut UdpRequest<'_>) {}

    fn check_udp_checksum(frame: &[u8]) {
        let parsed = parse(frame);
        let udp_len = parsed.u16_at(layout::LEN) as usize;
        assert!(verify_range(&parsed, ip::SRC, 8 + udp_len, ChecksumKind::Udp));
        assert!(verify_range(&parsed, ip::HEADER, ip::HEADER_LEN, ChecksumKind::Plain));
    }

    #[test]
    fn test_listener_replies_to_sender() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        stack.listen_on_port(1337, reply_pong).unwrap();
        let host = client();
        nic.queue_rx(host.udp_datagram(&OWN_MAC, &OWN_IP, 5000, 1337, b"ping"));

        assert_eq!(stack.poll(&mut nic), Dispatch::UdpHandled);

        let sent = nic.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), layout::DATA + 4);
        let reply = parse(&sent[0]);
        assert_eq!(reply.mac_at(eth::DST_MAC), host.mac());
        assert_eq!(reply.ip_at(ip::DST), host.ip());
        assert_eq!(reply.ip_at(ip::SRC), OWN_IP);
        assert_eq!(reply.u16_at(layout::SRC_PORT), 1337);
        assert_eq!(reply.u16_at(layout::DST_PORT), 5000);
        assert_eq!(reply.slice(layout::DATA, 4), b"pong");
        check_udp_checksum(&sent[0]);
    }

    #[test]
    fn test_reply_payload_capped() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        stack.listen_on_port(1337, reply_oversized).unwrap();
        nic.queue_rx(client().udp_datagram(&OWN_MAC, &OWN_IP, 5000, 1337, b"x"));

        assert_eq!(stack.poll(&mut nic), Dispatch::UdpHandled);

        let sent = nic.last_sent().unwrap();
        assert_eq!(sent.len(), layout::DATA + MAX_PAYLOAD);
        let reply = parse(sent);
        assert_eq!(reply.u16_at(layout::LEN) as usize, 8 + MAX_PAYLOAD);
        assert_eq!(reply.u16_at(ip::TOTAL_LEN) as usize, 28 + MAX_PAYLOAD);
        check_udp_checksum(sent);
    }

    #[test]
    fn test_listener_without_reply_sends_nothing() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        stack.listen_on_port(7, ignore).unwrap();
        nic.queue_rx(client().udp_datagram(&OWN_MAC, &OWN_IP, 5000, 7, b"quiet"));

        assert_eq!(stack.poll(&mut nic), Dispatch::UdpHandled);
        assert!(nic.sent().is_empty());
    }

    #[test]
    fn test_unclaimed_datagram_answered_manually() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        stack.listen_on_port(7, ignore).unwrap();
        let host = client();
        nic.queue_rx(host.udp_datagram(&OWN_MAC, &OWN_IP, 5000, 1337, b"status?"));

        assert_eq!(stack.poll(&mut nic), Dispatch::UdpUnclaimed);
        assert_eq!(stack.resident_udp_payload(), Some(&b"status?"[..]));

        stack.make_udp_reply(&mut nic, b"ok", 1337).unwrap();
        let reply = parse(nic.last_sent().unwrap());
        assert_eq!(reply.u16_at(layout::SRC_PORT), 1337);
        assert_eq!(reply.u16_at(layout::DST_PORT), 5000);
        assert_eq!(reply.ip_at(ip::DST), host.ip());
        assert_eq!(reply.slice(layout::DATA, 2), b"ok");

        // The reply consumed the resident datagram.
        assert_eq!(stack.resident_udp_payload(), None);
        assert_eq!(
            stack.make_udp_reply(&mut nic, b"again", 1337),
            Err(NetError::NoResidentFrame)
        );
    }

    #[test]
    fn test_next_poll_drops_resident_datagram() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        nic.queue_rx(client().udp_datagram(&OWN_MAC, &OWN_IP, 5000, 1337, b"late"));

        assert_eq!(stack.poll(&mut nic), Dispatch::UdpUnclaimed);
        stack.poll(&mut nic);
        assert_eq!(
            stack.make_udp_reply(&mut nic, b"too late", 1337),
            Err(NetError::NoResidentFrame)
        );
    }

    #[test]
    fn test_pause_and_resume_listener() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        stack.listen_on_port(1337, reply_pong).unwrap();
        let host = client();

        stack.pause_listen(1337);
        nic.queue_rx(host.udp_datagram(&OWN_MAC, &OWN_IP, 5000, 1337, b"ping"));
        assert_eq!(stack.poll(&mut nic), Dispatch::UdpUnclaimed);
        assert!(nic.sent().is_empty());

        stack.resume_listen(1337);
        nic.queue_rx(host.udp_datagram(&OWN_MAC, &OWN_IP, 5000, 1337, b"ping"));
        assert_eq!(stack.poll(&mut nic), Dispatch::UdpHandled);
        assert_eq!(nic.sent().len(), 1);
    }

    #[test]
    fn test_listener_table_is_bounded() {
        let mut stack = NetStack::new();
        for port in 0..MAX_LISTENERS as u16 {
            stack.listen_on_port(1000 + port, ignore).unwrap();
        }
        assert_eq!(stack.listen_on_port(2000, ignore), Err(NetError::TooManyListeners));
        // Re-registering an existing port needs no new slot.
        assert_eq!(stack.listen_on_port(1000, reply_pong), Ok(()));
    }

    #[test]
    fn test_send_to_peer_after_resolution() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        let peer = client();
        stack.set_peer_ip(peer.ip());

        assert_eq!(
            stack.send_udp(&mut nic, b"hello", 4000, &peer.ip(), 4001),
            Err(NetError::MustResolveFirst)
        );

        stack.poll(&mut nic);
        let requests = nic.take_sent();
        // Gateway first, then the peer.
        assert_eq!(requests.len(), 2);
        nic.queue_rx(peer.arp_reply_to(&requests[1]));
        assert_eq!(stack.poll(&mut nic), Dispatch::ArpResolved);

        stack.send_udp(&mut nic, b"hello", 4000, &peer.ip(), 4001).unwrap();
        let sent = nic.last_sent().unwrap();
        assert_eq!(sent.len(), layout::DATA + 5);
        let datagram = parse(sent);
        assert_eq!(datagram.mac_at(eth::DST_MAC), peer.mac());
        assert_eq!(datagram.u16_at(layout::SRC_PORT), 4000);
        assert_eq!(datagram.u16_at(layout::DST_PORT), 4001);
        check_udp_checksum(sent);
    }

    #[test]
    fn test_two_phase_send_to_multicast() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        let group = Ipv4Address::new(239, 255, 255, 250);

        stack.udp_prepare(1900, &group, 1900).unwrap();
        let payload = stack.udp_payload_mut();
        assert_eq!(payload.len(), MAX_PAYLOAD);
        payload[..6].copy_from_slice(b"M-SRCH");
        stack.udp_transmit(&mut nic, 6).unwrap();

        let sent = nic.last_sent().unwrap();
        let datagram = parse(sent);
        assert_eq!(datagram.mac_at(eth::DST_MAC), MacAddress::BROADCAST);
        assert_eq!(datagram.ip_at(ip::DST), group);
        assert_eq!(datagram.slice(layout::DATA, 6), b"M-SRCH");
        check_udp_checksum(sent);

        assert_eq!(stack.udp_transmit(&mut nic, 6), Err(NetError::NotPrepared));
    }

    #[test]
    fn test_send_payload_capped() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();

        stack
            .send_udp(&mut nic, &[7; 400], 5000, &Ipv4Address::BROADCAST, 5000)
            .unwrap();

        let sent = nic.last_sent().unwrap();
        assert_eq!(sent.len(), layout::DATA + MAX_PAYLOAD);
        check_udp_checksum(sent);
    }

    #[test]
    fn test_transmit_error_propagates_from_send() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        nic.fail_transmit(Some(NetError::LinkDown));

        assert_eq!(
            stack.send_udp(&mut nic, b"x", 1, &Ipv4Address::BROADCAST, 2),
            Err(NetError::LinkDown)
        );
    }
}
