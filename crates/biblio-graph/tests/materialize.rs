use biblio_core::{
    AuthorRecord, BookAuthorRecord, BookRecord, EntityKind, RelKind, SourceSnapshot,
};
use biblio_graph::{
    materialize_nodes, materialize_relationships, prepare_schema, GraphStats, MemoryGraph,
    SampleRequest, Sampler, SamplerConfig,
};

fn authors_and_books() -> SourceSnapshot {
    let mut snapshot = SourceSnapshot::default();
    for (id, first, last) in [(1, "Ursula", "Le Guin"), (2, "Octavia", "Butler"), (3, "Italo", "Calvino")] {
        snapshot.authors.push(AuthorRecord {
            id,
            first_name: first.into(),
            last_name: last.into(),
        });
    }
    for id in 1..=5 {
        snapshot.books.push(BookRecord {
            id,
            isbn: Some(format!("isbn-{id}")),
            title: format!("Book {id}"),
            publication_year: None,
            copies_available: 1,
        });
    }
    for (author_id, book_id) in [(1, 1), (1, 2), (2, 3), (3, 4), (3, 5)] {
        snapshot.book_authors.push(BookAuthorRecord { book_id, author_id });
    }
    snapshot
}

#[tokio::test]
async fn test_authors_and_books_scenario() {
    let graph = MemoryGraph::new();
    let snapshot = authors_and_books();

    prepare_schema(&graph).await.unwrap();
    materialize_nodes(&graph, &snapshot).await.unwrap();
    let links = materialize_relationships(&graph, &snapshot).await.unwrap();

    let stats = GraphStats::collect(&graph).await.unwrap();
    assert_eq!(stats.nodes[&EntityKind::Author], 3);
    assert_eq!(stats.nodes[&EntityKind::Book], 5);
    assert_eq!(stats.relationships[&RelKind::Wrote], 5);
    assert!(links.gaps.is_empty());
}

#[tokio::test]
async fn test_rerun_leaves_graph_unchanged() {
    let graph = MemoryGraph::new();
    let snapshot = authors_and_books();

    prepare_schema(&graph).await.unwrap();
    materialize_nodes(&graph, &snapshot).await.unwrap();
    materialize_relationships(&graph, &snapshot).await.unwrap();
    let before = GraphStats::collect(&graph).await.unwrap();

    for _ in 0..3 {
        materialize_nodes(&graph, &snapshot).await.unwrap();
        let links = materialize_relationships(&graph, &snapshot).await.unwrap();
        assert_eq!(links.relationships_created, 0);
        assert_eq!(links.relationships_matched, 5);
    }
    assert_eq!(GraphStats::collect(&graph).await.unwrap(), before);
    assert!(graph.dangling_edges().await.is_empty());
}

#[tokio::test]
async fn test_sample_of_materialized_graph_has_no_dangling_edges() {
    let graph = MemoryGraph::new();
    let snapshot = authors_and_books();
    materialize_nodes(&graph, &snapshot).await.unwrap();
    materialize_relationships(&graph, &snapshot).await.unwrap();

    let config = SamplerConfig {
        hub: Some(EntityKind::Book),
        small_fraction: 0.0,
        default_budget: 4,
    };
    let request = SampleRequest::new(4, [EntityKind::Author, EntityKind::Book]).with_seed(9);
    let sample = Sampler::new(&graph, config).sample(&request).await.unwrap();

    assert!(sample.nodes.len() <= 4);
    let ids = sample.node_ids();
    for edge in &sample.edges {
        assert!(ids.contains(&edge.from) && ids.contains(&edge.to));
    }
}
