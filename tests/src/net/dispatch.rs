//! Classification and idle-tick scheduling of the packet loop

#[cfg(test)]
mod tests {
    use crate::mock::{lan_config, parse, MockNic, RemoteHost, GATEWAY_IP, OWN_IP, OWN_MAC};
    use micronet::net::arp::{ResolutionState, TargetKind};
    use micronet::net::ethernet::MacAddress;
    use micronet::net::frame::{arp as layout, eth, ip};
    use micronet::net::ipv4::Ipv4Address;
    use micronet::{Dispatch, NetError, NetStack};

    fn neighbour() -> RemoteHost {
        RemoteHost::new(
            MacAddress::new([0x0a, 0x00, 0x27, 0x00, 0x00, 0x07]),
            Ipv4Address::new(192, 168, 1, 42),
        )
    }

    #[test]
    fn test_idle_poll_counts_ticks() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();

        for _ in 0..3 {
            assert_eq!(stack.poll(&mut nic), Dispatch::Idle);
        }
        assert_eq!(stack.idle_ticks(), 3);
    }

    #[test]
    fn test_gateway_request_repeats_after_wraparound() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();

        stack.poll(&mut nic);
        assert_eq!(nic.sent().len(), 1);

        for _ in 0..u16::MAX {
            stack.poll(&mut nic);
        }
        assert_eq!(nic.sent().len(), 1);
        assert_eq!(stack.idle_ticks(), 0);

        stack.poll(&mut nic);
        let sent = nic.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], sent[0]);
        assert_eq!(parse(&sent[1]).ip_at(layout::DST_IP), GATEWAY_IP);
        assert_eq!(
            stack.resolver().state(TargetKind::Gateway),
            ResolutionState::AwaitingReply
        );
    }

    #[test]
    fn test_new_gateway_is_asked_immediately() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        stack.poll(&mut nic);
        stack.poll(&mut nic);

        let replacement = Ipv4Address::new(192, 168, 1, 254);
        stack.set_gateway_ip(replacement);
        assert_eq!(stack.idle_ticks(), 0);

        stack.poll(&mut nic);
        let sent = nic.take_sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(parse(&sent[1]).ip_at(layout::DST_IP), replacement);
    }

    #[test]
    fn test_link_down_skips_gateway_request() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        nic.set_link_up(false);

        stack.poll(&mut nic);
        assert!(nic.sent().is_empty());
        assert_eq!(stack.resolver().state(TargetKind::Gateway), ResolutionState::Idle);

        nic.set_link_up(true);
        for _ in 0..u16::MAX {
            stack.poll(&mut nic);
        }
        assert!(nic.sent().is_empty());
        stack.poll(&mut nic);
        assert_eq!(nic.sent().len(), 1);
    }

    #[test]
    fn test_no_gateway_no_requests() {
        let config = micronet::NetConfig {
            gateway: Ipv4Address::UNSPECIFIED,
            ..lan_config()
        };
        let mut stack = NetStack::from_config(&config);
        let mut nic = MockNic::new();

        stack.poll(&mut nic);
        assert!(nic.sent().is_empty());
        assert!(stack.client_waiting_gateway());
    }

    #[test]
    fn test_short_ip_frame_produces_nothing() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        // Complete echo request for us, but the controller reports 10 bytes.
        let frame = neighbour().echo_request(&OWN_MAC, &OWN_IP);
        assert_eq!(&frame[eth::TYPE..eth::TYPE + 2], &[0x08, 0x00]);
        nic.queue_rx_reporting(frame, 10);

        assert_eq!(stack.poll(&mut nic), Dispatch::Ignored);
        assert!(nic.sent().is_empty());
        assert_eq!(stack.idle_ticks(), 0);
    }

    #[test]
    fn test_truncated_arp_ignored() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        let mut request = neighbour().arp_request(&OWN_IP);
        request.truncate(40);
        nic.queue_rx(request);

        assert_eq!(stack.poll(&mut nic), Dispatch::Ignored);
        assert!(nic.sent().is_empty());
    }

    #[test]
    fn test_ip_options_ignored() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        let mut frame = neighbour().echo_request(&OWN_MAC, &OWN_IP);
        frame[ip::VERSION_IHL] = 0x46;
        nic.queue_rx(frame);

        assert_eq!(stack.poll(&mut nic), Dispatch::Ignored);
        assert!(nic.sent().is_empty());
    }

    #[test]
    fn test_foreign_destination_ignored() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        nic.queue_rx(neighbour().echo_request(&OWN_MAC, &Ipv4Address::new(192, 168, 1, 6)));

        assert_eq!(stack.poll(&mut nic), Dispatch::Ignored);
        assert!(nic.sent().is_empty());
    }

    #[test]
    fn test_subnet_broadcast_accepted() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        let broadcast = Ipv4Address::new(192, 168, 1, 255);
        nic.queue_rx(neighbour().udp_datagram(&MacAddress::BROADCAST, &broadcast, 68, 4444, b"hello"));

        assert_eq!(stack.poll(&mut nic), Dispatch::UdpUnclaimed);
        assert_eq!(stack.resident_udp_payload(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_transmit_failure_is_contained() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        nic.fail_transmit(Some(NetError::TxBusy));

        nic.queue_rx(neighbour().arp_request(&OWN_IP));
        assert_eq!(stack.poll(&mut nic), Dispatch::ArpAnswered);
        assert_eq!(stack.poll(&mut nic), Dispatch::Idle);

        assert!(nic.sent().is_empty());
        // A who-has that never left keeps the gateway idle.
        assert_eq!(stack.resolver().state(TargetKind::Gateway), ResolutionState::Idle);
    }

    #[test]
    fn test_poll_consumes_one_frame() {
        let mut stack = NetStack::from_config(&lan_config());
        let mut nic = MockNic::new();
        nic.queue_rx(neighbour().arp_request(&OWN_IP));
        nic.queue_rx(neighbour().arp_request(&OWN_IP));

        assert_eq!(stack.poll(&mut nic), Dispatch::ArpAnswered);
        assert_eq!(nic.sent().len(), 1);
        assert_eq!(stack.poll(&mut nic), Dispatch::ArpAnswered);
        assert_eq!(stack.poll(&mut nic), Dispatch::Idle);
    }
}
