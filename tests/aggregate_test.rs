/// Response aggregation over dispatched outcomes
mod common;

#[cfg(test)]
mod aggregate_tests {
    use super::common::{addr, MockTransport};
    use aikv_router::cluster::{
        aggregate, AggregationPolicy, ClusterValue, Combinator, Command, NodeDispatcher,
        PerNodeOutcome,
    };
    use aikv_router::error::{AggregateErrorKind, NodeError};
    use aikv_router::observability::RouterMetrics;
    use aikv_router::protocol::RespValue;
    use aikv_router::AikvError;
    use std::sync::Arc;
    use std::time::Duration;

    fn pong(port: u16) -> PerNodeOutcome {
        PerNodeOutcome::value(addr(port), RespValue::simple_string("PONG"))
    }

    fn down(port: u16) -> PerNodeOutcome {
        PerNodeOutcome::error(
            addr(port),
            NodeError::Transport("connection refused".to_string()),
        )
    }

    fn aggregate_kind(result: aikv_router::Result<ClusterValue>) -> AggregateErrorKind {
        match result {
            Err(AikvError::Aggregate { kind, .. }) => kind,
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }

    #[test]
    fn test_all_succeeded_pong_collapses_for_any_count() {
        for count in 1..=8u16 {
            let outcomes = (0..count).map(|i| pong(7000 + i)).collect();
            let value = aggregate(&AggregationPolicy::AllSucceeded, outcomes).unwrap();
            assert_eq!(value, ClusterValue::Single(RespValue::simple_string("PONG")));
        }
    }

    #[test]
    fn test_all_succeeded_differing_replies() {
        let outcomes = vec![
            pong(7000),
            PerNodeOutcome::value(addr(7001), RespValue::simple_string("PANG")),
            pong(7002),
        ];
        match aggregate(&AggregationPolicy::AllSucceeded, outcomes) {
            Err(AikvError::Aggregate { kind, failures }) => {
                assert_eq!(kind, AggregateErrorKind::InconsistentReplies);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].address, addr(7001));
                assert_eq!(
                    failures[0].error,
                    NodeError::Diverged {
                        reference: addr(7000),
                        reply: RespValue::simple_string("PANG"),
                    }
                );
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }

    #[test]
    fn test_no_aggregation_keeps_node_pairing() {
        let outcomes = vec![
            PerNodeOutcome::value(addr(7000), RespValue::bulk_string("a")),
            PerNodeOutcome::value(addr(7001), RespValue::bulk_string("b")),
            PerNodeOutcome::value(addr(7002), RespValue::bulk_string("c")),
        ];
        let map = aggregate(&AggregationPolicy::NoAggregation, outcomes)
            .unwrap()
            .into_multi()
            .unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["127.0.0.1:7000"], RespValue::bulk_string("a"));
        assert_eq!(map["127.0.0.1:7001"], RespValue::bulk_string("b"));
        assert_eq!(map["127.0.0.1:7002"], RespValue::bulk_string("c"));

        let single = aggregate(
            &AggregationPolicy::NoAggregation,
            vec![PerNodeOutcome::value(addr(7000), RespValue::bulk_string("a"))],
        )
        .unwrap();
        assert_eq!(single, ClusterValue::Single(RespValue::bulk_string("a")));
    }

    #[test]
    fn test_one_succeeded_skips_failed_first_node() {
        let outcomes = vec![
            down(7000),
            PerNodeOutcome::value(addr(7001), RespValue::bulk_string("V")),
            PerNodeOutcome::value(addr(7002), RespValue::bulk_string("W")),
        ];
        let value = aggregate(&AggregationPolicy::OneSucceeded, outcomes).unwrap();
        assert_eq!(value, ClusterValue::Single(RespValue::bulk_string("V")));
    }

    #[tokio::test]
    async fn test_one_succeeded_ignores_arrival_order() {
        // the second node answers long before the first
        let transport = MockTransport::new(|node, _, _| {
            Ok(RespValue::bulk_string(format!("from-{}", node.port())))
        })
        .with_delay(addr(7000), Duration::from_millis(80));
        let dispatcher = NodeDispatcher::new(
            Arc::new(transport),
            Duration::from_secs(2),
            8,
            Arc::new(RouterMetrics::new()),
        );

        let nodes = vec![addr(7000), addr(7001), addr(7002)];
        let command = Command::from_parts(&["ECHO", "x"]).unwrap();
        for _ in 0..3 {
            let outcomes = dispatcher.fan_out(&nodes, &command).await;
            let order: Vec<_> = outcomes.iter().map(|o| o.address.clone()).collect();
            assert_eq!(order, nodes);

            let value = aggregate(&AggregationPolicy::OneSucceeded, outcomes).unwrap();
            assert_eq!(value, ClusterValue::Single(RespValue::bulk_string("from-7000")));
        }
    }

    #[tokio::test]
    async fn test_fan_out_respects_concurrency_limit() {
        let transport = MockTransport::new(|_, _, _| Ok(RespValue::ok()));
        let transport = (7000..7004).fold(transport, |t, port| {
            t.with_delay(addr(port), Duration::from_millis(40))
        });
        let dispatcher = NodeDispatcher::new(
            Arc::new(transport),
            Duration::from_secs(2),
            1,
            Arc::new(RouterMetrics::new()),
        );

        let nodes: Vec<_> = (7000..7004).map(addr).collect();
        let start = std::time::Instant::now();
        let outcomes = dispatcher
            .fan_out(&nodes, &Command::from_parts(&["PING"]).unwrap())
            .await;
        assert!(outcomes.iter().all(|o| o.is_success()));
        // one permit: the four sends run one after another
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[test]
    fn test_partial_failure_and_all_failed() {
        assert_eq!(
            aggregate_kind(aggregate(
                &AggregationPolicy::AllSucceededKeepMap,
                vec![pong(7000), down(7001)]
            )),
            AggregateErrorKind::PartialFailure
        );
        assert_eq!(
            aggregate_kind(aggregate(
                &AggregationPolicy::OneSucceeded,
                vec![down(7000), down(7001)]
            )),
            AggregateErrorKind::AllFailed
        );

        match aggregate(&AggregationPolicy::AllSucceeded, vec![pong(7000), down(7001)]) {
            Err(AikvError::Aggregate { failures, .. }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].address, addr(7001));
            }
            other => panic!("expected aggregate error, got {:?}", other),
        }
    }

    #[test]
    fn test_special_combinators() {
        let counts = vec![
            PerNodeOutcome::value(addr(7000), RespValue::integer(3)),
            PerNodeOutcome::value(addr(7001), RespValue::integer(4)),
            PerNodeOutcome::value(addr(7002), RespValue::integer(5)),
        ];
        assert_eq!(
            aggregate(&AggregationPolicy::special(Combinator::Sum), counts.clone()).unwrap(),
            ClusterValue::Single(RespValue::integer(12))
        );
        assert_eq!(
            aggregate(&AggregationPolicy::special(Combinator::Min), counts).unwrap(),
            ClusterValue::Single(RespValue::integer(3))
        );

        let tolerant = AggregationPolicy::Special {
            combine: Combinator::Sum,
            tolerate_partial: true,
        };
        let value = aggregate(
            &tolerant,
            vec![
                PerNodeOutcome::value(addr(7000), RespValue::integer(3)),
                down(7001),
            ],
        )
        .unwrap();
        assert_eq!(value, ClusterValue::Single(RespValue::integer(3)));
    }

    #[test]
    fn test_empty_value_accessors() {
        let empty = aggregate(&AggregationPolicy::OneSucceeded, Vec::new()).unwrap();
        assert!(empty.is_empty());
        assert!(matches!(
            empty.single_value(),
            Err(AikvError::WrongVariant { .. })
        ));
        assert!(matches!(
            empty.multi_value(),
            Err(AikvError::WrongVariant { .. })
        ));
    }
}
