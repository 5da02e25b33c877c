use super::*;
use crate::partition::Region;
use crate::source::InMemorySource;
use std::fmt::Write as _;
use std::thread;

struct GraphBuilder {
    text: String,
}

impl GraphBuilder {
    fn new() -> Self {
        Self {
            text: "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<osm version=\"0.6\">\n".into(),
        }
    }

    fn node(mut self, id: NodeId, lat: f64, lon: f64) -> Self {
        writeln!(self.text, r#"  <node id="{id}" lat="{lat}" lon="{lon}"/>"#).unwrap();
        self
    }

    fn way(self, id: u64, nodes: &[NodeId]) -> Self {
        self.tagged_way(id, nodes, &[("highway", "residential")])
    }

    fn tagged_way(mut self, id: u64, nodes: &[NodeId], tags: &[(&str, &str)]) -> Self {
        writeln!(self.text, r#"  <way id="{id}" version="1">"#).unwrap();
        for node in nodes {
            writeln!(self.text, r#"    <nd ref="{node}"/>"#).unwrap();
        }
        for (k, v) in tags {
            writeln!(self.text, r#"    <tag k="{k}" v="{v}"/>"#).unwrap();
        }
        self.text.push_str("  </way>\n");
        self
    }

    fn raw(mut self, line: &str) -> Self {
        self.text.push_str(line);
        self.text.push('\n');
        self
    }

    fn build(mut self) -> Arc<InMemorySource> {
        self.text.push_str("</osm>\n");
        Arc::new(InMemorySource::from_text(&self.text))
    }
}

/// Two unit squares side by side: `A` is lon 0..1, `B` is lon 1..2.
fn two_regions() -> Partitions {
    Partitions::new(vec![
        Region::Bbox([0.0, 0.0, 1.0, 1.0]),
        Region::Bbox([1.0, 0.0, 2.0, 1.0]),
    ])
    .unwrap()
}

fn collect<S: GraphSource>(streamer: &FragmentStreamer<S>, partition: usize) -> Vec<Fragment> {
    streamer
        .stream(partition)
        .unwrap()
        .collect::<Result<Vec<_>>>()
        .unwrap()
}

fn edges(fragments: &[Fragment]) -> Vec<Edge> {
    fragments
        .iter()
        .filter_map(|f| match f {
            Fragment::Edge(edge) => Some(*edge),
            Fragment::Node(_) => None,
        })
        .collect()
}

#[test]
fn cross_partition_edge_names_destination_worker() {
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(2, 0.5, 1.5)
        .way(10, &[1, 2])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let first = collect(&streamer, 0);
    let weight = edge_weight(Coord::new(0.5, 0.5), Coord::new(0.5, 1.5));
    assert_eq!(
        first,
        vec![
            Fragment::Node(1),
            Fragment::Edge(Edge {
                from: 1,
                to: 2,
                weight,
                to_worker: Some(2),
            }),
        ]
    );

    // Node 1 is not owned by the second partition, so the way contributes
    // nothing there.
    assert_eq!(collect(&streamer, 1), vec![Fragment::Node(2)]);
}

#[test]
fn buildings_never_contribute_edges() {
    let source = GraphBuilder::new()
        .node(3, 0.1, 0.1)
        .node(4, 0.2, 0.2)
        .node(5, 0.3, 0.3)
        .tagged_way(20, &[3, 4, 5, 3], &[("building", "yes")])
        .tagged_way(21, &[4, 5], &[("building", "house"), ("highway", "service")])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let fragments = collect(&streamer, 0);
    assert_eq!(
        fragments,
        vec![Fragment::Node(3), Fragment::Node(4), Fragment::Node(5)]
    );
}

#[test]
fn nodes_precede_edges_in_source_order() {
    let source = GraphBuilder::new()
        .node(1, 0.1, 0.1)
        .node(2, 0.2, 0.2)
        .way(10, &[2, 1])
        .node(3, 0.3, 0.3)
        .way(11, &[1, 2, 3])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let fragments = collect(&streamer, 0);
    let node_count = fragments
        .iter()
        .take_while(|f| matches!(f, Fragment::Node(_)))
        .count();
    assert_eq!(node_count, 3);
    assert!(fragments[node_count..].iter().all(|f| matches!(f, Fragment::Edge(_))));

    let pairs: Vec<_> = edges(&fragments).iter().map(|e| (e.from, e.to)).collect();
    assert_eq!(pairs, vec![(2, 1), (1, 2), (2, 3)]);
    assert!(edges(&fragments).iter().all(|e| e.to_worker.is_none()));
}

#[test]
fn last_node_is_not_joined_to_first() {
    let source = GraphBuilder::new()
        .node(1, 0.1, 0.1)
        .node(2, 0.1, 0.2)
        .node(3, 0.2, 0.2)
        .way(10, &[1, 2, 3])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let pairs: Vec<_> = edges(&collect(&streamer, 0))
        .iter()
        .map(|e| (e.from, e.to))
        .collect();
    assert_eq!(pairs, vec![(1, 2), (2, 3)]);
}

#[test]
fn edges_only_leave_owned_nodes() {
    // 1 and 3 are in A, 2 is in B. The way zig-zags across the border.
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(2, 0.5, 1.5)
        .node(3, 0.6, 0.6)
        .way(10, &[1, 2, 3])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let a = edges(&collect(&streamer, 0));
    assert_eq!(a.len(), 1);
    assert_eq!((a[0].from, a[0].to, a[0].to_worker), (1, 2, Some(2)));

    let b = edges(&collect(&streamer, 1));
    assert_eq!(b.len(), 1);
    assert_eq!((b[0].from, b[0].to, b[0].to_worker), (2, 3, Some(1)));
}

#[test]
fn overlapping_regions_use_first_match() {
    // The second region covers the first entirely.
    let partitions = Partitions::new(vec![
        Region::Bbox([0.0, 0.0, 1.0, 1.0]),
        Region::Bbox([0.0, 0.0, 2.0, 1.0]),
    ])
    .unwrap();
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(2, 0.5, 1.5)
        .way(10, &[2, 1])
        .build();
    let streamer = FragmentStreamer::new(source, partitions);

    assert_eq!(collect(&streamer, 0), vec![Fragment::Node(1)]);

    let b = collect(&streamer, 1);
    assert_eq!(b[0], Fragment::Node(2));
    assert_eq!(edges(&b)[0].to_worker, Some(1));
}

#[test]
fn hint_is_set_iff_partitions_differ() {
    let partitions = Partitions::new(vec![
        Region::Bbox([0.0, 0.0, 1.0, 1.0]),
        Region::Bbox([1.0, 0.0, 2.0, 1.0]),
        Region::Bbox([2.0, 0.0, 3.0, 1.0]),
    ])
    .unwrap();
    let source = GraphBuilder::new()
        .node(1, 0.5, 1.2)
        .node(2, 0.5, 1.4)
        .node(3, 0.5, 0.5)
        .node(4, 0.5, 2.5)
        .way(10, &[1, 2])
        .way(11, &[2, 3])
        .way(12, &[1, 4])
        .build();
    let streamer = FragmentStreamer::new(source, partitions.clone());
    let resolver = PartitionAssigner::new(Arc::clone(streamer.assigner().source()), partitions);

    let fragments = collect(&streamer, 1);
    let edges = edges(&fragments);
    assert_eq!(edges.len(), 3);
    for edge in edges {
        let from = resolver.resolve(edge.from).unwrap().partition;
        let to = resolver.resolve(edge.to).unwrap().partition;
        if from == to {
            assert_eq!(edge.to_worker, None, "{edge:?}");
        } else {
            assert_eq!(edge.to_worker, Some(worker_id_of(to)), "{edge:?}");
        }
    }
}

#[test]
fn cache_is_seeded_with_owned_nodes_and_memoizes_foreign_ones() {
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(2, 0.5, 1.5)
        .node(3, 0.4, 0.4)
        .way(10, &[1, 2])
        .way(11, &[3, 2])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let mut stream = streamer.stream(0).unwrap();
    assert!(stream.cache().is_empty());
    let fragments: Vec<_> = stream.by_ref().map(Result::unwrap).collect();
    assert_eq!(fragments.len(), 4);
    assert_eq!(stream.partition_index(), 0);

    let cache = stream.cache();
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get(1).unwrap().partition, 0);
    assert_eq!(cache.get(3).unwrap().partition, 0);
    assert_eq!(cache.get(2).unwrap().partition, 1);
    assert_eq!(cache.iter().filter(|(_, n)| n.partition == 0).count(), 2);
}

#[test]
fn empty_partition_yields_empty_stream() {
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .way(10, &[1, 1])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    assert!(collect(&streamer, 1).is_empty());
}

#[test]
fn out_of_range_partition_is_unknown_worker() {
    let streamer = FragmentStreamer::new(GraphBuilder::new().build(), two_regions());
    match streamer.stream(2) {
        Err(Error::UnknownWorker {
            worker_id: 3,
            partitions: 2,
        }) => {}
        Err(other) => panic!("unexpected {other:?}"),
        Ok(_) => panic!("stream accepted an unknown partition"),
    }
}

#[test]
fn missing_endpoint_fails_after_delivered_fragments() {
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(2, 0.6, 0.6)
        .way(10, &[1, 2, 99])
        .way(11, &[2, 1])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let mut stream = streamer.stream(0).unwrap();
    assert_eq!(stream.next().unwrap().unwrap(), Fragment::Node(1));
    assert_eq!(stream.next().unwrap().unwrap(), Fragment::Node(2));
    assert!(matches!(stream.next(), Some(Ok(Fragment::Edge(Edge { from: 1, to: 2, .. })))));
    assert!(matches!(
        stream.next(),
        Some(Err(Error::NodeNotFound { node_id: 99 }))
    ));
    // Fused after the error.
    assert!(stream.next().is_none());
    assert!(stream.next().is_none());
}

#[test]
fn uncovered_endpoint_is_unassignable() {
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(7, 5.0, 5.0)
        .way(10, &[1, 7])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    let result: Result<Vec<_>> = streamer.stream(0).unwrap().collect();
    match result {
        Err(Error::UnassignablePartition { node_id: 7, .. }) => {}
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unbalanced_way_markers_are_malformed() {
    let cases = [
        GraphBuilder::new().node(1, 0.5, 0.5).raw("  </way>").build(),
        GraphBuilder::new()
            .node(1, 0.5, 0.5)
            .raw(r#"  <way id="1">"#)
            .raw(r#"  <way id="2">"#)
            .build(),
        Arc::new(InMemorySource::from_text(
            "<osm>\n<node id=\"1\" lat=\"0.5\" lon=\"0.5\"/>\n<way id=\"3\">\n<nd ref=\"1\"/>",
        )),
    ];

    for source in cases {
        let streamer = FragmentStreamer::new(source, two_regions());
        let result: Result<Vec<_>> = streamer.stream(0).unwrap().collect();
        assert!(
            matches!(result, Err(Error::MalformedWay { .. })),
            "unexpected {result:?}"
        );
    }
}

#[test]
fn self_closing_way_is_empty() {
    let source = GraphBuilder::new()
        .node(1, 0.5, 0.5)
        .node(2, 0.6, 0.6)
        .raw(r#"  <way id="5"/>"#)
        .way(6, &[1, 2])
        .build();
    let streamer = FragmentStreamer::new(source, two_regions());

    assert_eq!(edges(&collect(&streamer, 0)).len(), 1);
}

fn grid(size: u64, step: f64) -> Arc<InMemorySource> {
    let id = |row: u64, col: u64| row * size + col + 1;
    let mut builder = GraphBuilder::new();
    for row in 0..size {
        for col in 0..size {
            builder = builder.node(id(row, col), row as f64 * step, col as f64 * step);
        }
    }
    let mut way_id = 1_000;
    for row in 0..size {
        let nodes: Vec<_> = (0..size).map(|col| id(row, col)).collect();
        builder = builder.way(way_id, &nodes);
        way_id += 1;
    }
    for col in 0..size {
        let nodes: Vec<_> = (0..size).rev().map(|row| id(row, col)).collect();
        builder = builder.way(way_id, &nodes);
        way_id += 1;
    }
    builder.build()
}

fn strips(count: usize, width: f64) -> Partitions {
    let regions = (0..count)
        .map(|i| Region::Bbox([i as f64 * width, -1.0, (i + 1) as f64 * width, 100.0]))
        .collect();
    Partitions::new(regions).unwrap()
}

#[test]
fn indexed_streams_match_scanning_streams() {
    let source = grid(6, 0.1);
    let partitions = strips(3, 0.2);
    let scanning = FragmentStreamer::new(Arc::clone(&source), partitions.clone());
    let index = NodeIndex::build(source.as_ref(), &partitions).unwrap();
    let indexed = scanning.clone().with_index(Arc::new(index));

    for partition in 0..partitions.len() {
        assert_eq!(
            collect(&scanning, partition),
            collect(&indexed, partition),
            "partition {partition}"
        );
    }
}

#[test]
fn every_grid_edge_is_emitted_exactly_once() {
    let size = 6;
    let source = grid(size, 0.1);
    let partitions = strips(3, 0.2);
    let streamer = FragmentStreamer::new(source, partitions.clone());

    let mut nodes = Vec::new();
    let mut all_edges = Vec::new();
    for partition in 0..partitions.len() {
        let fragments = collect(&streamer, partition);
        for fragment in fragments {
            match fragment {
                Fragment::Node(id) => nodes.push(id),
                Fragment::Edge(edge) => all_edges.push((edge.from, edge.to)),
            }
        }
    }

    nodes.sort_unstable();
    nodes.dedup();
    assert_eq!(nodes.len() as u64, size * size);

    // Rows and columns each contribute `size - 1` segments per line.
    let expected = (2 * size * (size - 1)) as usize;
    assert_eq!(all_edges.len(), expected);
    all_edges.sort_unstable();
    all_edges.dedup();
    assert_eq!(all_edges.len(), expected);
}

#[test]
fn concurrent_streams_do_not_interfere() {
    let streamer = FragmentStreamer::new(grid(8, 0.1), strips(4, 0.2));
    let expected: Vec<_> = (0..4).map(|p| collect(&streamer, p)).collect();

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let streamer = streamer.clone();
            thread::spawn(move || {
                let partition = i % 4;
                (partition, collect(&streamer, partition))
            })
        })
        .collect();

    for handle in handles {
        let (partition, fragments) = handle.join().unwrap();
        assert_eq!(fragments, expected[partition]);
    }
}
