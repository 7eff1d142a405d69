use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use flowrun::{
    CompileError, Node, OptimizationLevel, PlanCompiler, RuntimeContext, Workflow,
};

fn compiler() -> PlanCompiler {
    PlanCompiler::new(RuntimeContext::default())
}

/// a -> b -> c, with d and e independent.
fn fan_workflow() -> Workflow {
    Workflow::new("wf-fan", "fan")
        .with_node(Node::data("a"))
        .with_node(Node::data("b").with_dependencies(["a"]))
        .with_node(Node::data("c").with_dependencies(["b"]))
        .with_node(Node::data("d"))
        .with_node(Node::data("e"))
}

fn transitive_deps(workflow: &Workflow) -> HashMap<String, HashSet<String>> {
    let direct: HashMap<String, Vec<String>> = workflow
        .nodes
        .iter()
        .map(|n| (n.id.clone(), n.dependencies().to_vec()))
        .collect();

    fn collect(
        id: &str,
        direct: &HashMap<String, Vec<String>>,
        seen: &mut HashSet<String>,
    ) {
        for dep in direct.get(id).into_iter().flatten() {
            if seen.insert(dep.clone()) {
                collect(dep, direct, seen);
            }
        }
    }

    workflow
        .nodes
        .iter()
        .map(|n| {
            let mut seen = HashSet::new();
            collect(&n.id, &direct, &mut seen);
            (n.id.clone(), seen)
        })
        .collect()
}

#[test]
fn test_fan_workflow_groups_and_order() {
    let outcome = compiler()
        .compile(&fan_workflow(), OptimizationLevel::Basic)
        .unwrap();
    let plan = &outcome.plan;

    // The three independent roots form one parallel group; b and c are
    // singletons and stay out of the group list.
    assert_eq!(
        plan.parallel_groups,
        vec![vec!["a".to_string(), "d".to_string(), "e".to_string()]]
    );
    assert_eq!(plan.execution_order, vec!["a", "d", "e", "b", "c"]);
}

#[test]
fn test_cycle_blocks_compilation() {
    let cyclic = Workflow::new("wf-cycle", "cycle")
        .with_node(Node::trigger("start"))
        .with_node(Node::data("a").with_dependencies(["start", "c"]))
        .with_node(Node::data("b").with_dependencies(["a"]))
        .with_node(Node::data("c").with_dependencies(["b"]));

    let error = compiler()
        .compile(&cyclic, OptimizationLevel::Basic)
        .unwrap_err();
    let path = error.cycle_path().expect("cycle error carries its path");
    assert_eq!(path.first(), path.last());
    for id in ["a", "b", "c"] {
        assert!(path.contains(&id.to_string()), "{id} missing from {path:?}");
    }
}

#[test]
fn test_cycle_via_edge_list_detected() {
    let cyclic = Workflow::new("wf-cycle-edges", "cycle")
        .with_node(Node::data("a"))
        .with_node(Node::data("b"))
        .with_edge("a", "b")
        .with_edge("b", "a");
    assert!(matches!(
        compiler().compile(&cyclic, OptimizationLevel::Basic),
        Err(CompileError::CycleDetected { .. })
    ));
}

#[test]
fn test_topological_validity() {
    let workflow = Workflow::new("wf-topo", "topo")
        .with_node(Node::trigger("t"))
        .with_node(Node::action("sync", "crm.sync").with_dependencies(["enrich", "t"]))
        .with_node(Node::data("enrich").with_dependencies(["fetch"]))
        .with_node(Node::action("fetch", "api.fetch").with_dependencies(["t"]))
        .with_node(Node::ai("summarize").with_dependencies(["enrich"]));

    let plan = compiler()
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap()
        .plan;

    let position: HashMap<&str, usize> = plan
        .execution_order
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    assert_eq!(position.len(), workflow.nodes.len());
    for node in &workflow.nodes {
        for dep in node.dependencies() {
            assert!(
                position[dep.as_str()] < position[node.id.as_str()],
                "{dep} must precede {}",
                node.id
            );
        }
    }
}

#[test]
fn test_parallel_groups_are_independent() {
    let workflow = Workflow::new("wf-indep", "independence")
        .with_node(Node::trigger("start"))
        .with_node(Node::data("left").with_dependencies(["start"]))
        .with_node(Node::data("right").with_dependencies(["start"]))
        .with_node(Node::ai("classify").with_dependencies(["start"]))
        .with_node(Node::data("join").with_dependencies(["left", "right", "classify"]));

    let plan = compiler()
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap()
        .plan;
    let deps = transitive_deps(&workflow);

    assert!(!plan.parallel_groups.is_empty());
    for group in &plan.parallel_groups {
        assert!(group.len() > 1, "singletons must not be wrapped in groups");
        for member in group {
            for other in group {
                if member != other {
                    assert!(
                        !deps[member].contains(other),
                        "{member} depends on {other} within one group"
                    );
                }
            }
        }
    }
}

#[test]
fn test_cache_idempotence() {
    let compiler = compiler();
    let workflow = fan_workflow();

    let first = compiler
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap();
    assert!(!first.cached);

    let second = compiler
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap();
    assert!(second.cached);
    assert_eq!(first.plan.version_hash, second.plan.version_hash);
    assert!(Arc::ptr_eq(&first.plan, &second.plan));
}

#[test]
fn test_cache_hit_survives_storage_reordering() {
    let compiler = compiler();
    let workflow = fan_workflow();
    compiler
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap();

    // Same node content, different storage order: same hash, cache hit.
    let mut reordered = workflow.clone();
    reordered.nodes.reverse();
    let outcome = compiler
        .compile(&reordered, OptimizationLevel::Basic)
        .unwrap();
    assert!(outcome.cached);
}

#[test]
fn test_optimization_levels_cached_separately() {
    let compiler = compiler();
    let workflow = fan_workflow();
    compiler
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap();

    let aggressive = compiler
        .compile(&workflow, OptimizationLevel::Aggressive)
        .unwrap();
    assert!(!aggressive.cached);
    assert_eq!(compiler.cache().stats().total_entries, 2);
}

#[test]
fn test_explicit_invalidation_forces_recompile() {
    let compiler = compiler();
    let workflow = fan_workflow();
    let first = compiler
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap();

    compiler
        .cache()
        .invalidate_version(&workflow.id, &first.plan.version_hash);
    let after = compiler
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap();
    assert!(!after.cached);
}

#[test]
fn test_cacheable_nodes_from_config_only() {
    let workflow = Workflow::new("wf-cache", "cacheable")
        .with_node(Node::data("transform"))
        .with_node(Node::ai("classify").with_dependencies(["transform"]))
        .with_node(
            Node::action("lookup", "db.read")
                .read_only(true)
                .with_dependencies(["transform"]),
        )
        .with_node(Node::action("write", "db.write").with_dependencies(["classify", "lookup"]));

    let plan = compiler()
        .compile(&workflow, OptimizationLevel::Basic)
        .unwrap()
        .plan;
    assert_eq!(plan.cacheable_nodes, vec!["transform", "classify", "lookup"]);
}

#[test]
fn test_duration_estimate_rewards_parallelism() {
    let compiler = compiler();
    let parallel = compiler
        .compile(&fan_workflow(), OptimizationLevel::Basic)
        .unwrap()
        .plan;
    let sequential_total: u64 = fan_workflow()
        .nodes
        .iter()
        .map(|n| n.baseline_cost_ms())
        .sum();

    assert!(parallel.estimated_duration_ms < sequential_total);
    assert!(parallel.estimated_duration_ms > 0);

    // A strictly linear workflow gains nothing and reports the plain sum.
    let linear = Workflow::new("wf-linear", "linear")
        .with_node(Node::data("a"))
        .with_node(Node::data("b").with_dependencies(["a"]))
        .with_node(Node::data("c").with_dependencies(["b"]));
    let linear_plan = compiler
        .compile(&linear, OptimizationLevel::Basic)
        .unwrap()
        .plan;
    assert_eq!(linear_plan.estimated_duration_ms, 360);
}
