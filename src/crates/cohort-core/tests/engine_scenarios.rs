//! End-to-end runs of small graphs with scripted oracles

use cohort_core::supervisor::FORCED_FINISH_REASONING;
use cohort_core::testing::ScriptedOracle;
use cohort_core::{
    last_message, project_messages, CompiledGraph, GraphError, RouteOptions, RunContext,
    SchemaField, StateGraph, StateSchema, StepEvent, Supervisor, END,
};
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn routing_schema() -> StateSchema {
    StateSchema::new()
        .field(SchemaField::append("messages"))
        .field(SchemaField::overriding("next"))
        .field(SchemaField::overriding("reasoning"))
        .field(SchemaField::overriding("instructions"))
}

/// `Capability <-> Supervisor`, counting capability invocations.
fn capability_loop(
    oracle: Arc<ScriptedOracle>,
    entry: &str,
    invocations: Arc<AtomicUsize>,
) -> CompiledGraph {
    let options = RouteOptions::new(["Capability"]);
    let mut graph = StateGraph::named("loop", routing_schema());
    graph
        .add_node("Capability", move |_state, _ctx| {
            let invocations = invocations.clone();
            Box::pin(async move {
                let n = invocations.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(json!({"messages": [{"role": "ai", "content": format!("work {n}"), "name": "Capability"}]}))
            })
        })
        .unwrap();
    graph
        .add_node_instance(
            "Supervisor",
            Supervisor::new("Supervisor", "Route {team_members}", options.clone(), oracle),
        )
        .unwrap();
    graph.add_edge("Capability", "Supervisor").unwrap();
    graph
        .add_routing_edges("Supervisor", "next", &options, END)
        .unwrap();
    graph.set_entry_point(entry).unwrap();
    graph.compile().unwrap()
}

async fn collect(graph: &CompiledGraph, input: Value) -> Vec<Result<StepEvent, GraphError>> {
    graph
        .stream(input, RunContext::for_thread("10001"))
        .collect()
        .await
}

#[tokio::test]
async fn test_repetitive_oracle_is_forced_to_finish() {
    let oracle = Arc::new(ScriptedOracle::always("Capability"));
    let invocations = Arc::new(AtomicUsize::new(0));
    let graph = capability_loop(oracle.clone(), "Capability", invocations.clone());

    let events: Vec<StepEvent> = collect(&graph, json!({"messages": ["go"]}))
        .await
        .into_iter()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(invocations.load(Ordering::SeqCst), 4);
    assert_eq!(oracle.calls(), 4);

    let nodes: Vec<&str> = events.iter().map(|e| e.node.as_str()).collect();
    assert_eq!(
        nodes,
        vec![
            "Capability", "Supervisor", "Capability", "Supervisor", "Capability", "Supervisor",
            "Capability", "Supervisor"
        ]
    );

    let last = events.last().unwrap();
    assert!(last.is_final());
    assert_eq!(last.update["next"], "FINISH");
    assert_eq!(last.update["reasoning"], FORCED_FINISH_REASONING);
    assert_eq!(last.update["instructions"], "");
}

#[tokio::test]
async fn test_repetitive_oracle_from_supervisor_entry() {
    let oracle = Arc::new(ScriptedOracle::always("Capability"));
    let invocations = Arc::new(AtomicUsize::new(0));
    let graph = capability_loop(oracle.clone(), "Supervisor", invocations.clone());

    let state = graph
        .invoke(json!({"messages": ["go"]}), RunContext::standalone())
        .await
        .unwrap();

    assert_eq!(oracle.calls(), 4);
    assert_eq!(invocations.load(Ordering::SeqCst), 3);
    assert_eq!(state["next"], "FINISH");
    assert_eq!(state["messages"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn test_immediate_finish_runs_no_capability() {
    let oracle = Arc::new(ScriptedOracle::always("FINISH"));
    let invocations = Arc::new(AtomicUsize::new(0));
    let graph = capability_loop(oracle, "Supervisor", invocations.clone());

    let events = collect(&graph, json!({"messages": ["hello"]})).await;

    assert_eq!(events.len(), 1);
    let only = events[0].as_ref().unwrap();
    assert_eq!(only.node, "Supervisor");
    assert_eq!(only.next, END);
    assert_eq!(invocations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_subgraph_is_one_parent_step() {
    let child_schema = StateSchema::new()
        .field(SchemaField::append("messages"))
        .field(SchemaField::append("team_members"));
    let mut child = StateGraph::named("child", child_schema);
    child
        .add_node("first", |_s, _c| {
            Box::pin(async move { Ok(json!({"messages": [{"role": "ai", "content": "draft"}]})) })
        })
        .unwrap();
    child
        .add_node("second", |state, _c| {
            Box::pin(async move {
                let members = state["team_members"].as_array().map(Vec::len).unwrap_or(0);
                Ok(json!({"messages": [{"role": "ai", "content": format!("final for {members}"), "name": "second"}]}))
            })
        })
        .unwrap();
    child.set_entry_point("first").unwrap();
    child.add_edge("first", "second").unwrap();
    child.add_edge("second", END).unwrap();
    let child = child.compile().unwrap();

    let mut parent = StateGraph::named("parent", routing_schema());
    parent
        .add_subgraph(
            "Team",
            child,
            project_messages(["Writer", "Editor"]),
            last_message(),
        )
        .unwrap();
    parent.set_entry_point("Team").unwrap();
    parent.add_edge("Team", END).unwrap();
    let parent = parent.compile().unwrap();

    let events = collect(&parent, json!({"messages": ["write it"]})).await;

    assert_eq!(events.len(), 1);
    let step = events[0].as_ref().unwrap();
    assert_eq!(step.node, "Team");
    assert_eq!(
        step.update,
        json!({"messages": [{"role": "ai", "content": "final for 2", "name": "second"}]})
    );
    assert_eq!(step.state["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_nested_supervisors_keep_separate_counters() {
    let workers = Arc::new(AtomicUsize::new(0));
    let inner_options = RouteOptions::new(["Worker"]);
    let mut inner = StateGraph::named("inner", routing_schema());
    let counter = workers.clone();
    inner
        .add_node("Worker", move |_s, _c| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({"messages": [{"role": "ai", "content": "w"}]}))
            })
        })
        .unwrap();
    let inner_supervisor = Supervisor::new(
        "inner",
        "",
        inner_options.clone(),
        Arc::new(ScriptedOracle::always("Worker")),
    );
    let inner_id = inner_supervisor.id();
    inner.add_node_instance("supervisor", inner_supervisor).unwrap();
    inner.add_edge("Worker", "supervisor").unwrap();
    inner
        .add_routing_edges("supervisor", "next", &inner_options, END)
        .unwrap();
    inner.set_entry_point("supervisor").unwrap();
    let inner = inner.compile().unwrap();

    let outer_options = RouteOptions::new(["Team"]);
    let outer_oracle = Arc::new(ScriptedOracle::sequence(["Team", "Team", "FINISH"]));
    let outer_supervisor = Supervisor::new("outer", "", outer_options.clone(), outer_oracle.clone());
    let outer_id = outer_supervisor.id();
    let mut outer = StateGraph::named("outer", routing_schema());
    outer
        .add_subgraph(
            "Team",
            inner,
            project_messages(Vec::<String>::new()),
            last_message(),
        )
        .unwrap();
    outer.add_node_instance("supervisor", outer_supervisor).unwrap();
    outer.add_edge("Team", "supervisor").unwrap();
    outer
        .add_routing_edges("supervisor", "next", &outer_options, END)
        .unwrap();
    outer.set_entry_point("supervisor").unwrap();
    let outer = outer.compile().unwrap();

    let ctx = RunContext::for_thread("20002");
    let (state, events) = outer
        .invoke_with_trace(json!({"messages": ["go"]}), ctx.clone())
        .await
        .unwrap();

    let nodes: Vec<&str> = events.iter().map(|e| e.node.as_str()).collect();
    assert_eq!(
        nodes,
        vec!["supervisor", "Team", "supervisor", "Team", "supervisor"]
    );
    assert_eq!(outer_oracle.calls(), 3);
    assert_eq!(state["next"], "FINISH");

    // The team keeps its counts when re-entered: its first decision on the
    // second visit is already forced, so Worker never runs a fourth time.
    assert_eq!(workers.load(Ordering::SeqCst), 3);
    assert_eq!(ctx.scope().visits(inner_id).count("Worker"), 4);
    assert_eq!(ctx.scope().visits(outer_id).count("Team"), 2);
    assert_eq!(ctx.scope().visits(outer_id).count("Worker"), 0);
}

#[tokio::test]
async fn test_forced_finish_to_follow_up_node_stops_counting() {
    let notified = Arc::new(AtomicUsize::new(0));
    let options = RouteOptions::new(["Generator"]);
    let supervisor = Supervisor::new(
        "supervisor",
        "",
        options.clone(),
        Arc::new(ScriptedOracle::always("Generator")),
    );
    let id = supervisor.id();

    let mut graph = StateGraph::named("charts", routing_schema());
    graph.add_node_instance("supervisor", supervisor).unwrap();
    graph
        .add_node("Generator", |_s, _c| {
            Box::pin(async move { Ok(json!({"messages": [{"role": "ai", "content": "chart"}]})) })
        })
        .unwrap();
    let counter = notified.clone();
    graph
        .add_node("Notify", move |_s, _c| {
            let counter = counter.clone();
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(json!({}))
            })
        })
        .unwrap();
    graph.add_edge("Generator", "supervisor").unwrap();
    graph
        .add_routing_edges("supervisor", "next", &options, "Notify")
        .unwrap();
    graph.add_edge("Notify", END).unwrap();
    graph.set_entry_point("supervisor").unwrap();
    let graph = graph.compile().unwrap();

    let ctx = RunContext::for_thread("30003");
    let (state, events) = graph
        .invoke_with_trace(json!({"messages": ["plot"]}), ctx.clone())
        .await
        .unwrap();

    let last = events.last().unwrap();
    assert_eq!(last.node, "Notify");
    assert!(last.is_final());
    assert_eq!(events[events.len() - 2].next, "Notify");
    assert_eq!(state["reasoning"], FORCED_FINISH_REASONING);
    assert_eq!(notified.load(Ordering::SeqCst), 1);
    assert_eq!(ctx.scope().visits(id).count("Generator"), 4);
}

#[tokio::test]
async fn test_step_limit_is_a_hard_backstop() {
    let mut graph = StateGraph::named("ping-pong", routing_schema());
    graph
        .add_node("ping", |_s, _c| Box::pin(async move { Ok(json!({})) }))
        .unwrap();
    graph
        .add_node("pong", |_s, _c| Box::pin(async move { Ok(json!({})) }))
        .unwrap();
    graph.set_entry_point("ping").unwrap();
    graph.add_edge("ping", "pong").unwrap();
    graph.add_edge("pong", "ping").unwrap();
    let graph = graph.compile().unwrap().with_step_limit(5);

    let events = collect(&graph, json!({})).await;

    assert_eq!(events.len(), 6);
    assert!(events[..5].iter().all(Result::is_ok));
    assert!(matches!(
        events[5],
        Err(GraphError::StepLimitExceeded { limit: 5 })
    ));
}

#[tokio::test]
async fn test_step_limit_fires_before_visit_limit_when_lower() {
    let oracle = Arc::new(ScriptedOracle::always("Capability"));
    let graph = capability_loop(oracle, "Supervisor", Arc::new(AtomicUsize::new(0)))
        .with_step_limit(3);

    let err = graph
        .invoke(json!({}), RunContext::standalone())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::StepLimitExceeded { limit: 3 }));
}

#[tokio::test]
async fn test_unmatched_branch_fails_run() {
    let mut graph = StateGraph::new(routing_schema());
    graph
        .add_node("router", |_s, _c| {
            Box::pin(async move { Ok(json!({"next": "nowhere"})) })
        })
        .unwrap();
    graph
        .add_node("target", |_s, _c| Box::pin(async move { Ok(json!({})) }))
        .unwrap();
    graph.set_entry_point("router").unwrap();
    graph
        .add_conditional_edge(
            "router",
            |state| state["next"].as_str().map(str::to_string),
            [("somewhere", "target")],
        )
        .unwrap();
    let graph = graph.compile().unwrap();

    let err = graph
        .invoke(json!({}), RunContext::standalone())
        .await
        .unwrap_err();
    match err {
        GraphError::NoMatchingBranch { node, key } => {
            assert_eq!(node, "router");
            assert_eq!(key, "nowhere");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_missing_outgoing_edge_fails_run() {
    let mut graph = StateGraph::new(routing_schema());
    graph
        .add_node("dead_end", |_s, _c| Box::pin(async move { Ok(json!({})) }))
        .unwrap();
    graph.set_entry_point("dead_end").unwrap();
    let graph = graph.compile().unwrap();

    let events = collect(&graph, json!({})).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Err(GraphError::NoOutgoingEdge(n)) if n == "dead_end"));
}

#[tokio::test]
async fn test_conditional_edge_wins_over_static() {
    let mut graph = StateGraph::new(routing_schema());
    graph
        .add_node("start", |_s, _c| {
            Box::pin(async move { Ok(json!({"next": "b"})) })
        })
        .unwrap();
    graph
        .add_node("a", |_s, _c| Box::pin(async move { Ok(json!({})) }))
        .unwrap();
    graph
        .add_node("b", |_s, _c| Box::pin(async move { Ok(json!({})) }))
        .unwrap();
    graph.set_entry_point("start").unwrap();
    graph.add_edge("start", "a").unwrap();
    graph
        .add_conditional_edge(
            "start",
            |state| state["next"].as_str().map(str::to_string),
            [("b", "b")],
        )
        .unwrap();
    graph.add_edge("a", END).unwrap();
    graph.add_edge("b", END).unwrap();
    let graph = graph.compile().unwrap();

    let (_, events) = graph
        .invoke_with_trace(json!({}), RunContext::standalone())
        .await
        .unwrap();
    assert_eq!(events[1].node, "b");
}

#[tokio::test]
async fn test_node_failure_aborts_run() {
    let mut graph = StateGraph::new(routing_schema());
    graph
        .add_node("flaky", |_s, _c| {
            Box::pin(async move { Err(GraphError::collaborator("storage", "disk full")) })
        })
        .unwrap();
    graph.set_entry_point("flaky").unwrap();
    graph.add_edge("flaky", END).unwrap();
    let graph = graph.compile().unwrap();

    let events = collect(&graph, json!({})).await;
    assert_eq!(events.len(), 1);
    assert!(matches!(
        &events[0],
        Err(GraphError::Collaborator { collaborator, .. }) if collaborator == "storage"
    ));
}

#[tokio::test]
async fn test_update_with_unknown_field_is_rejected() {
    let mut graph = StateGraph::new(routing_schema());
    graph
        .add_node("typo", |_s, _c| {
            Box::pin(async move { Ok(json!({"mesages": ["oops"]})) })
        })
        .unwrap();
    graph.set_entry_point("typo").unwrap();
    graph.add_edge("typo", END).unwrap();
    let graph = graph.compile().unwrap();

    let err = graph
        .invoke(json!({}), RunContext::standalone())
        .await
        .unwrap_err();
    assert!(matches!(err, GraphError::StateUpdate { ref node, .. } if node == "typo"));
}

#[tokio::test]
async fn test_stream_is_lazy_and_fresh_per_call() {
    let oracle = Arc::new(ScriptedOracle::always("FINISH"));
    let invocations = Arc::new(AtomicUsize::new(0));
    let graph = capability_loop(oracle.clone(), "Capability", invocations.clone());

    let mut stream = graph.stream(json!({"messages": ["a"]}), RunContext::standalone());
    assert_eq!(invocations.load(Ordering::SeqCst), 0);

    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.node, "Capability");
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(oracle.calls(), 0);
    drop(stream);

    let events = collect(&graph, json!({"messages": ["b"]})).await;
    assert_eq!(events.len(), 2);
    let state = &events[1].as_ref().unwrap().state;
    assert_eq!(state["messages"][0], "b");
    assert_eq!(state["messages"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_concurrent_runs_do_not_share_counters() {
    let oracle = Arc::new(ScriptedOracle::always("Capability"));
    let invocations = Arc::new(AtomicUsize::new(0));
    let graph = capability_loop(oracle.clone(), "Supervisor", invocations.clone());

    let (a, b) = tokio::join!(
        graph.invoke(json!({}), RunContext::for_thread("1")),
        graph.invoke(json!({}), RunContext::for_thread("2")),
    );
    assert_eq!(a.unwrap()["next"], "FINISH");
    assert_eq!(b.unwrap()["next"], "FINISH");
    assert_eq!(invocations.load(Ordering::SeqCst), 6);
    assert_eq!(oracle.calls(), 8);
}

#[tokio::test]
async fn test_thread_id_reaches_nodes_and_subgraphs() {
    let seen = Arc::new(observed::Seen::default());
    let child_seen = seen.clone();
    let mut child = StateGraph::named("child", StateSchema::new().field(SchemaField::append("messages")));
    child
        .add_node("observer", move |_s, ctx| {
            let seen = child_seen.clone();
            Box::pin(async move {
                seen.push(ctx.thread_id().map(str::to_string), ctx.depth());
                Ok(json!({}))
            })
        })
        .unwrap();
    child.set_entry_point("observer").unwrap();
    child.add_edge("observer", END).unwrap();

    let mut parent = StateGraph::new(routing_schema());
    parent
        .add_subgraph(
            "Child",
            child.compile().unwrap(),
            project_messages(Vec::<String>::new()),
            last_message(),
        )
        .unwrap();
    parent.set_entry_point("Child").unwrap();
    parent.add_edge("Child", END).unwrap();

    parent
        .compile()
        .unwrap()
        .invoke(json!({}), RunContext::for_thread("77777"))
        .await
        .unwrap();

    assert_eq!(seen.take(), vec![(Some("77777".to_string()), 1)]);
}

mod observed {
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct Seen(Mutex<Vec<(Option<String>, usize)>>);

    impl Seen {
        pub fn push(&self, thread: Option<String>, depth: usize) {
            self.0.lock().unwrap().push((thread, depth));
        }

        pub fn take(&self) -> Vec<(Option<String>, usize)> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }
}
