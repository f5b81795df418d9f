//! Read-path benchmarks for the prop graph
//!
//! Run with: `cargo bench -p propgraph-core`
//!
//! These benchmarks measure the two calls live components make on every render:
//! - descendant_tree over a wide, nested variant (single recursive query)
//! - resolve for a component-scoped value through a change set

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use propgraph_core::db::{DatabaseService, GraphStore, TursoStore};
use propgraph_core::models::{AttributeContext, IngestedSchema, PropSpec, Scope, Tenancy, WorkspaceId};
use propgraph_core::services::{AttributeService, ImportedSchemaVariant, PropGraphService};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::runtime::Runtime;

/// Setup services over a fresh database
async fn setup_services() -> (PropGraphService, AttributeService, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("bench.db");

    let db = Arc::new(DatabaseService::new(db_path).await.unwrap());
    let store: Arc<dyn GraphStore> = Arc::new(TursoStore::new(db));
    (
        PropGraphService::new(store.clone()),
        AttributeService::new(store),
        temp_dir,
    )
}

/// Schema with `groups` objects of `fields` string props each
fn wide_schema(groups: usize, fields: usize) -> IngestedSchema {
    let mut schema = IngestedSchema::new("Bench::Wide");
    for g in 0..groups {
        let children = (0..fields)
            .map(|f| PropSpec::string(format!("Field{}", f)))
            .collect();
        schema = schema.with_domain_prop(PropSpec::object(format!("Group{}", g), children));
    }
    schema
}

async fn import_wide(graph: &PropGraphService, scope: &Scope) -> ImportedSchemaVariant {
    graph.import_schema(scope, &wide_schema(20, 10)).await.unwrap()
}

/// Benchmark full tree fetch for a ~225 prop variant
fn bench_descendant_tree(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (graph, _attributes, _temp) = rt.block_on(setup_services());
    let scope = Scope::head(Tenancy::new(WorkspaceId::generate()));
    let imported = rt.block_on(import_wide(&graph, &scope));

    c.bench_function("descendant_tree", |b| {
        b.iter(|| {
            rt.block_on(async {
                let tree = graph
                    .descendant_tree(&scope, black_box(imported.root_prop.root))
                    .await
                    .unwrap();
                black_box(tree.prop_count())
            })
        });
    });
}

/// Benchmark resolution with default, component and branch candidates present
fn bench_resolve(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let (graph, attributes, _temp) = rt.block_on(setup_services());
    let tenancy = Tenancy::new(WorkspaceId::generate());
    let head = Scope::head(tenancy);

    let (branch, prop_id, component_id) = rt.block_on(async {
        let imported = import_wide(&graph, &head).await;
        let prop = graph
            .find_prop_by_path(&head, imported.variant.id, &["domain", "Group3", "Field7"])
            .await
            .unwrap();
        let component = graph
            .create_component(&head, "bench", imported.variant.id)
            .await
            .unwrap();
        attributes
            .create(
                &head,
                AttributeContext::for_component(prop.id, component.id),
                json!("head"),
            )
            .await
            .unwrap();

        let change_set = graph.create_change_set(tenancy, "bench").await.unwrap();
        let branch = Scope::for_change_set(tenancy, change_set.id);
        attributes
            .set_value(
                &branch,
                AttributeContext::for_component(prop.id, component.id),
                json!("branch"),
            )
            .await
            .unwrap();
        (branch, prop.id, component.id)
    });

    c.bench_function("resolve_component_in_change_set", |b| {
        b.iter(|| {
            rt.block_on(async {
                let value = attributes
                    .resolve(&branch, black_box(prop_id), Some(component_id))
                    .await
                    .unwrap();
                black_box(value.physical_id)
            })
        });
    });
}

criterion_group!(benches, bench_descendant_tree, bench_resolve);
criterion_main!(benches);
