//! End-to-end worker steps over a simulated host.

use std::sync::Arc;

use arrow_array::cast::AsArray;
use arrow_array::Array;
use arrow_data::ArrayData;
use serde_json::{json, Value};

use colony_batch::Batches;
use colony_core::StateError;
use colony_state::{message_batch_schema, GroupSchema, GroupState, Getter};
use colony_test_utils::{agent_id_str, agent_id_value, scenario_columns, scenario_schema, StepHost};

fn empty_outboxes(n: u32) -> Vec<Vec<Value>> {
    vec![
        (0..n).map(agent_id_value).collect(),
        (0..n).map(|_| json!([])).collect(),
    ]
}

struct Host {
    agents: StepHost,
    msgs: StepHost,
}

impl Host {
    fn scenario() -> Self {
        let mut agents = StepHost::new("agents", scenario_schema(), &scenario_columns());
        let mut msgs = StepHost::new("messages", message_batch_schema(), &empty_outboxes(3));
        agents.publish();
        msgs.publish();
        Self { agents, msgs }
    }
}

struct Worker {
    agents: Batches,
    msgs: Batches,
}

impl Worker {
    fn new() -> Self {
        Self {
            agents: Batches::default(),
            msgs: Batches::default(),
        }
    }

    fn group<'a>(&'a mut self, host: &Host, schema: &Arc<GroupSchema>) -> GroupState<'a> {
        let agent = self
            .agents
            .sync(&host.agents.current(), schema.agent())
            .unwrap();
        let msg = self.msgs.sync(&host.msgs.current(), schema.msg()).unwrap();
        GroupState::new(Arc::clone(schema), agent, msg).unwrap()
    }
}

#[test]
fn scenario_flushes_only_touched_columns() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    assert_eq!(group.n_agents(), 3);

    group.load("health").unwrap();
    group.get_agent(0).set("health", &json!(5)).unwrap();
    group
        .get_agent(2)
        .add_message("agent-7", "greet", &json!({"x": 1}))
        .unwrap();

    let changes = group.flush_changes().unwrap();
    assert_eq!(changes.agent.len(), 1);
    let health = &changes.agent[0];
    assert_eq!(health.field_index, 1);
    let field = schema.agent().field(1);
    let array = health.data.to_array(field.data_type()).unwrap();
    let values = array.as_primitive::<arrow_array::types::Int32Type>();
    assert_eq!(values.len(), 3);
    assert_eq!(values.values().to_vec(), vec![5, 80, 60]);

    assert_eq!(changes.msg.len(), 1);
    let outboxes = changes.msg[0]
        .data
        .to_array(schema.msg().field(changes.msg[0].field_index).data_type())
        .unwrap();
    let lists = outboxes.as_list::<i32>();
    let lengths: Vec<usize> = (0..lists.len()).map(|i| lists.value(i).len()).collect();
    assert_eq!(lengths, vec![0, 0, 1]);
}

#[test]
fn flushed_step_round_trips_into_the_next_step() {
    let mut host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();

    let changes = {
        let mut group = worker.group(&host, &schema);
        group.load_missing().unwrap();
        let mut agent = group.get_agent(0);
        agent.set("health", &Value::Null).unwrap();
        agent
            .set("tags", &json!({"nested": [1, "two", null], "ok": true}))
            .unwrap();
        agent.rebind(1);
        agent
            .add_message(["a", "b"], "ping", &json!([1, 2, 3]))
            .unwrap();
        group.flush_changes().unwrap()
    };
    host.agents.merge(&changes.agent);
    host.msgs.merge(&changes.msg);
    host.agents.publish();
    host.msgs.publish();

    let mut group = worker.group(&host, &schema);
    group.load_missing().unwrap();
    let mut first = group.get_agent(0);
    assert_eq!(first.get("health").unwrap(), Value::Null);
    assert_eq!(
        first.get("tags").unwrap(),
        json!({"nested": [1, "two", null], "ok": true})
    );
    first.rebind(1);
    assert_eq!(first.get("health").unwrap(), json!(80));
    let messages = first.messages().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].to.as_slice(), ["a", "b"]);
    assert_eq!(messages[0].kind, "ping");
    assert_eq!(messages[0].data, json!([1, 2, 3]));
    first.rebind(2);
    assert_eq!(first.get("tags").unwrap(), Value::Null);
}

#[test]
fn agent_id_is_read_only_and_never_flushed() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);

    let mut agent = group.get_agent(1);
    assert_eq!(agent.get("agent_id").unwrap(), json!(agent_id_str(1)));
    let err = agent.set("agent_id", &json!("forged")).unwrap_err();
    assert!(matches!(err, StateError::ReadOnlyField { field } if field == "agent_id"));
    assert_eq!(agent.get("agent_id").unwrap(), json!(agent_id_str(1)));

    group.load_missing().unwrap();
    let changes = group.flush_changes().unwrap();
    let id_index = schema.agent().index_of("agent_id").unwrap();
    assert!(changes.agent.iter().all(|c| c.field_index != id_index));
    assert_eq!(changes.agent.len(), 2);
}

#[test]
fn unmaterialized_field_needs_dynamic_access() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);

    {
        let mut agent = group.get_agent(0);
        let err = agent.get("health").unwrap_err();
        assert!(matches!(err, StateError::MissingField { field } if field == "health"));
        let err = agent.get("mana").unwrap_err();
        assert!(matches!(err, StateError::MissingField { .. }));

        agent.set_dynamic_access(true);
        assert_eq!(agent.get("health").unwrap(), json!(100));
        assert_eq!(agent.get("tags").unwrap(), json!(["scout"]));
    }

    let changes = group.flush_changes().unwrap();
    let fields: Vec<usize> = changes.agent.iter().map(|c| c.field_index).collect();
    assert_eq!(fields, vec![1, 2]);
}

#[test]
fn custom_getter_transforms_reads_but_not_writes() {
    let host = Host::scenario();
    let schema = GroupSchema::builder(scenario_schema())
        .getter(
            "health",
            Getter::new(|v| json!({"hp": v.clone()})),
        )
        .build()
        .unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    group.load("health").unwrap();

    let mut agent = group.get_agent(2);
    assert_eq!(agent.get("health").unwrap(), json!({"hp": 60}));
    agent.set("health", &json!(61)).unwrap();
    assert_eq!(agent.get("health").unwrap(), json!({"hp": 61}));
    agent.modify("health", |_| json!(1)).unwrap();
    assert_eq!(
        group.agent_batch().column("health").unwrap().cell(2).unwrap().into_owned(),
        json!(1)
    );
}

#[test]
fn custom_getter_column_missing_raises_missing_field() {
    let host = Host::scenario();
    let schema = GroupSchema::builder(scenario_schema())
        .getter("tags", Getter::new(Value::clone))
        .build()
        .unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    let err = group.get_agent(0).get("tags").unwrap_err();
    assert!(matches!(err, StateError::MissingField { field } if field == "tags"));
}

#[test]
fn messages_accumulate_with_independent_payloads() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);

    let mut payload = json!({"x": 1});
    let mut agent = group.get_agent(0);
    agent.add_message("agent-7", "greet", &payload).unwrap();
    agent
        .add_message(["agent-7", "agent-9"], "greet", &payload)
        .unwrap();
    payload["x"] = json!(99);

    let messages = agent.messages().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].to.as_slice(), ["agent-7"]);
    assert_eq!(messages[1].to.as_slice(), ["agent-7", "agent-9"]);
    assert!(messages.iter().all(|m| m.data == json!({"x": 1})));

    agent.rebind(1);
    assert!(agent.messages().unwrap().is_empty());
}

#[test]
fn writing_messages_requires_a_message_list() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    let mut agent = group.get_agent(0);

    let err = agent.set("messages", &json!("hello")).unwrap_err();
    assert!(matches!(err, StateError::InvalidMessage { .. }));

    agent
        .set("messages", &json!([{"to": ["b"], "type": "t", "data": 3}]))
        .unwrap();
    assert_eq!(agent.messages().unwrap()[0].data, json!(3));
}

#[test]
fn to_json_snapshots_every_field() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    group.load_missing().unwrap();

    let mut agent = group.get_agent(1);
    agent.add_message("x", "t", &json!(null)).unwrap();
    let snapshot = agent.to_json().unwrap();
    assert_eq!(
        snapshot,
        json!({
            "agent_id": agent_id_str(1),
            "health": 80,
            "tags": {"rank": 2, "squad": ["a", "b"]},
            "messages": [{"to": ["x"], "type": "t", "data": null}],
        })
    );
}

#[test]
fn repeated_flush_is_stable() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    group.load_missing().unwrap();
    group
        .get_agent(0)
        .add_message("b", "t", &json!({"k": [1]}))
        .unwrap();

    let first = group.flush_changes().unwrap();
    let second = group.flush_changes().unwrap();
    let decode = |changes: &colony_state::GroupChanges| -> Vec<(usize, ArrayData)> {
        let records = changes.agent.iter().map(|c| (c, schema.agent()));
        let records = records.chain(changes.msg.iter().map(|c| (c, schema.msg())));
        records
            .map(|(c, layout)| {
                let data_type = layout.field(c.field_index).data_type();
                (c.field_index, c.data.to_array_data(data_type).unwrap())
            })
            .collect()
    };
    assert_eq!(decode(&first), decode(&second));

    let mut agent = group.get_agent(0);
    assert_eq!(agent.messages().unwrap()[0].data, json!({"k": [1]}));
}

#[test]
fn behavior_bookkeeping_is_caller_supplied() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    let mut agent = group.get_agent(0);
    assert_eq!(agent.behavior_index(), None);
    agent.set_behavior_index(3);
    agent.rebind(2);
    assert_eq!(agent.behavior_index(), Some(3));
    assert_eq!(agent.index(), 2);
}

#[test]
fn out_of_range_agent_reports_index() {
    let host = Host::scenario();
    let schema = GroupSchema::new(scenario_schema()).unwrap();
    let mut worker = Worker::new();
    let mut group = worker.group(&host, &schema);
    let err = group.get_agent(7).get("agent_id").unwrap_err();
    assert!(matches!(
        err,
        StateError::Batch(colony_core::BatchError::IndexOutOfRange { index: 7, len: 3, .. })
    ));
}
