//! Property tests: written values read back deep-equal and never alias
//! column storage.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use colony_batch::Batches;
use colony_state::{message_batch_schema, GroupSchema, GroupState};
use colony_test_utils::{agent_id_value, scenario_columns, scenario_schema, StepHost};

fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z0-9 ]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn hosts() -> (StepHost, StepHost) {
    let mut agents = StepHost::new("agents", scenario_schema(), &scenario_columns());
    let outboxes = vec![
        (0..3).map(agent_id_value).collect(),
        (0..3).map(|_| json!([])).collect(),
    ];
    let mut msgs = StepHost::new("messages", message_batch_schema(), &outboxes);
    agents.publish();
    msgs.publish();
    (agents, msgs)
}

fn bind_group<'a>(
    agent_batches: &'a mut Batches,
    msg_batches: &'a mut Batches,
    agents: &StepHost,
    msgs: &StepHost,
    schema: &Arc<GroupSchema>,
) -> GroupState<'a> {
    let agent = agent_batches
        .sync(&agents.current(), schema.agent())
        .unwrap();
    let msg = msg_batches.sync(&msgs.current(), schema.msg()).unwrap();
    GroupState::new(Arc::clone(schema), agent, msg).unwrap()
}

proptest! {
    #[test]
    fn write_then_read_is_deep_equal_and_unaliased(
        index in 0usize..3,
        field in prop::sample::select(vec!["health", "tags"]),
        value in json_value(),
    ) {
        let (agents, msgs) = hosts();
        let schema = GroupSchema::new(scenario_schema()).unwrap();
        let (mut agent_batches, mut msg_batches) = (Batches::default(), Batches::default());
        let mut group = bind_group(&mut agent_batches, &mut msg_batches, &agents, &msgs, &schema);
        group.load_missing().unwrap();

        let mut agent = group.get_agent(index);
        agent.set(field, &value).unwrap();

        let mut read = agent.get(field).unwrap();
        prop_assert_eq!(&read, &value);
        read.take();
        prop_assert_eq!(agent.get(field).unwrap(), value);
    }

    #[test]
    fn any_field_survives_a_step(index in 0usize..3, value in json_value()) {
        let (mut agents, mut msgs) = hosts();
        let schema = GroupSchema::new(scenario_schema()).unwrap();
        let (mut agent_batches, mut msg_batches) = (Batches::default(), Batches::default());

        let changes = {
            let mut group =
                bind_group(&mut agent_batches, &mut msg_batches, &agents, &msgs, &schema);
            group.load("tags").unwrap();
            group.get_agent(index).set("tags", &value).unwrap();
            group.flush_changes().unwrap()
        };
        agents.merge(&changes.agent);
        msgs.merge(&changes.msg);
        agents.publish();
        msgs.publish();

        let mut group = bind_group(&mut agent_batches, &mut msg_batches, &agents, &msgs, &schema);
        group.load("tags").unwrap();
        prop_assert_eq!(group.get_agent(index).get("tags").unwrap(), value);
    }
}
