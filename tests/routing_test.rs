/// Route resolution against topology snapshots
mod common;

#[cfg(test)]
mod routing_tests {
    use super::common::{addr, six_node_topology, six_nodes};
    use aikv_router::cluster::{
        key_slot, resolve, NodeAddress, NodeInfo, ReadFrom, RoutingDirective, SlotRange,
        SlotTarget, SlotType, Topology, TopologyHandle, SLOT_COUNT,
    };
    use aikv_router::AikvError;
    use std::collections::HashSet;

    fn directives() -> Vec<RoutingDirective> {
        vec![
            RoutingDirective::AllNodes,
            RoutingDirective::AllPrimaries,
            RoutingDirective::ByAddress(addr(7004)),
            RoutingDirective::slot(0),
            RoutingDirective::slot(16383),
            RoutingDirective::key("user:{42}:name"),
        ]
    }

    #[test]
    fn test_multi_node_resolution_is_stable_and_distinct() {
        let topology = six_node_topology();

        for (directive, expected) in [
            (RoutingDirective::AllNodes, 6),
            (RoutingDirective::AllPrimaries, 3),
        ] {
            let first = resolve(&directive, &topology, ReadFrom::Primary).unwrap();
            assert_eq!(first.len(), expected);
            let distinct: HashSet<_> = first.iter().collect();
            assert_eq!(distinct.len(), expected);

            for _ in 0..20 {
                let again = resolve(&directive, &topology, ReadFrom::Primary).unwrap();
                assert_eq!(again, first);
            }
        }

        let primaries = resolve(&RoutingDirective::AllPrimaries, &topology, ReadFrom::Primary)
            .unwrap();
        assert_eq!(primaries, vec![addr(7000), addr(7001), addr(7002)]);
    }

    #[test]
    fn test_every_slot_has_exactly_one_primary() {
        let topology = six_node_topology();
        let nodes = six_nodes();

        for slot in 0..SLOT_COUNT {
            let targets = resolve(&RoutingDirective::slot(slot), &topology, ReadFrom::Primary)
                .unwrap();
            assert_eq!(targets.len(), 1, "slot {}", slot);

            let owners: Vec<&NodeAddress> = nodes
                .iter()
                .filter(|n| n.slots.iter().any(|r| r.contains(slot)))
                .map(|n| &n.address)
                .collect();
            assert_eq!(owners, vec![&targets[0]], "slot {}", slot);
        }
    }

    #[test]
    fn test_key_routes_to_slot_owner() {
        let topology = six_node_topology();

        // "foo" hashes to 12182, owned by the third primary
        let targets = resolve(&RoutingDirective::key("foo"), &topology, ReadFrom::Primary)
            .unwrap();
        assert_eq!(targets, vec![addr(7002)]);

        // hash tags keep related keys on one node
        let a = resolve(&RoutingDirective::key("{user1}:a"), &topology, ReadFrom::Primary)
            .unwrap();
        let b = resolve(&RoutingDirective::key("{user1}:b"), &topology, ReadFrom::Primary)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(key_slot(b"{user1}:a"), key_slot(b"user1"));
    }

    #[test]
    fn test_replica_preferred_reads() {
        let topology = six_node_topology();
        let directive = RoutingDirective::BySlot {
            target: SlotTarget::Slot(100),
            slot_type: SlotType::ReplicaPreferred,
        };

        // replica reads are opt-in
        assert_eq!(
            resolve(&directive, &topology, ReadFrom::Primary).unwrap(),
            vec![addr(7000)]
        );
        assert_eq!(
            resolve(&directive, &topology, ReadFrom::PreferReplica).unwrap(),
            vec![addr(7003)]
        );

        // writes never go to a replica
        assert_eq!(
            resolve(&RoutingDirective::slot(100), &topology, ReadFrom::PreferReplica).unwrap(),
            vec![addr(7000)]
        );
    }

    #[test]
    fn test_replica_preferred_without_replicas_falls_back() {
        let topology = Topology::new(vec![NodeInfo::primary(
            addr(7000),
            vec![SlotRange::new(0, SLOT_COUNT).unwrap()],
        )])
        .unwrap();
        let directive = RoutingDirective::BySlot {
            target: SlotTarget::Key("k".into()),
            slot_type: SlotType::ReplicaPreferred,
        };
        assert_eq!(
            resolve(&directive, &topology, ReadFrom::PreferReplica).unwrap(),
            vec![addr(7000)]
        );
    }

    #[test]
    fn test_random_node_stays_in_topology() {
        let topology = six_node_topology();
        let mut seen = HashSet::new();
        for _ in 0..200 {
            let targets = resolve(&RoutingDirective::RandomNode, &topology, ReadFrom::Primary)
                .unwrap();
            assert_eq!(targets.len(), 1);
            assert!(topology.contains(&targets[0]));
            seen.insert(targets[0].clone());
        }
        // 200 draws over 6 nodes hit more than one of them
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_unknown_address_is_not_found() {
        let topology = six_node_topology();
        let missing = NodeAddress::new("invalidHost", 9999);
        let result = resolve(
            &RoutingDirective::ByAddress(missing.clone()),
            &topology,
            ReadFrom::Primary,
        );
        match result {
            Err(AikvError::NodeNotFound(address)) => assert_eq!(address, missing),
            other => panic!("expected NodeNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_topology_has_no_nodes() {
        let topology = Topology::empty();
        for directive in directives() {
            assert!(matches!(
                resolve(&directive, &topology, ReadFrom::Primary),
                Err(AikvError::NoNodesAvailable)
            ));
        }
    }

    #[test]
    fn test_resolution_survives_serialization() {
        let topology = six_node_topology();

        let json = serde_json::to_string(&topology).unwrap();
        let from_json: Topology = serde_json::from_str(&json).unwrap();
        let from_bincode = Topology::from_bytes(&topology.to_bytes().unwrap()).unwrap();

        for restored in [from_json, from_bincode] {
            assert_eq!(restored, topology);
            for directive in directives() {
                assert_eq!(
                    resolve(&directive, &restored, ReadFrom::Primary).unwrap(),
                    resolve(&directive, &topology, ReadFrom::Primary).unwrap(),
                    "{}",
                    directive
                );
            }
        }
    }

    #[test]
    fn test_invalid_serialized_topology_is_rejected() {
        // a single primary that leaves most of the slot space unassigned
        let json = r#"{"nodes":[{"address":"127.0.0.1:7000","role":"primary","slots":[{"start":0,"end":10}]}]}"#;
        assert!(serde_json::from_str::<Topology>(json).is_err());
    }

    #[test]
    fn test_snapshot_outlives_swap() {
        let handle = TopologyHandle::new(six_node_topology());
        let before = handle.snapshot();
        let version = handle.version();

        let single = Topology::new(vec![NodeInfo::primary(
            addr(8000),
            vec![SlotRange::new(0, SLOT_COUNT).unwrap()],
        )])
        .unwrap();
        assert!(handle.replace(single) > version);

        // the old snapshot still resolves against the old shape
        assert_eq!(
            resolve(&RoutingDirective::slot(0), &before, ReadFrom::Primary).unwrap(),
            vec![addr(7000)]
        );
        assert_eq!(
            resolve(&RoutingDirective::slot(0), &handle.snapshot(), ReadFrom::Primary).unwrap(),
            vec![addr(8000)]
        );
    }

    #[test]
    fn test_directive_parsing() {
        assert_eq!(
            "all-primaries".parse::<RoutingDirective>().unwrap(),
            RoutingDirective::AllPrimaries
        );
        assert_eq!(
            "127.0.0.1:7001".parse::<RoutingDirective>().unwrap(),
            RoutingDirective::ByAddress(addr(7001))
        );
        assert_eq!(
            "key:foo".parse::<RoutingDirective>().unwrap(),
            RoutingDirective::key("foo")
        );
        assert!("slot:notanumber".parse::<RoutingDirective>().is_err());
    }
}
