use crate::core::{KernelError, MessageKind, Port, PortKind, PortRequirement};
use crate::library::{
    HYDRAULIC_FIXED_DISPLACEMENT_PUMP, HYDRAULIC_LAMINAR_ORIFICE, HYDRAULIC_TANK_C, HYDRAULIC_VOLUME,
    SIGNAL_CONSTANT, SIGNAL_GAIN, SIGNAL_SUM,
};

use std::sync::Arc;

use crate::system::Model;

use super::components::register_junction;
use super::{drain_of, has_message, new_model, registry};

#[test]
fn connection_is_symmetric_and_shares_one_node() {
    let mut m = new_model("Sym");
    let root = m.root();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();

    m.connect(pump, "P2", vol, "P1").unwrap();

    let a = m.port_id(pump, "P2").unwrap();
    let b = m.port_id(vol, "P1").unwrap();
    assert!(m.are_connected(a, b));
    assert!(m.are_connected(b, a));
    assert!(m.port(pump, "P2").unwrap().is_connected());
    assert!(m.port(vol, "P1").unwrap().is_connected());
    assert_eq!(m.node_of_port(pump, "P2"), m.node_of_port(vol, "P1"));

    let node = m.node(m.node_of_port(vol, "P1").unwrap()).unwrap();
    assert_eq!(node.num_connected_ports(), 2);
}

#[test]
fn connecting_twice_is_rejected() {
    let mut m = new_model("Twice");
    let root = m.root();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();
    m.connect(pump, "P2", vol, "P1").unwrap();
    assert!(matches!(
        m.connect(vol, "P1", pump, "P2"),
        Err(KernelError::InvalidConnection(_))
    ));
}

#[test]
fn c_to_c_is_rejected_and_leaves_both_ports_free() {
    let mut m = new_model("CC");
    let root = m.root();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();
    let tank = m.add_component(root, HYDRAULIC_TANK_C, "").unwrap();
    let before_vol = m.node_of_port(vol, "P2");
    let before_tank = m.node_of_port(tank, "P1");

    assert!(!m.connect_ports(vol, "P2", tank, "P1"));

    assert!(!m.port(vol, "P2").unwrap().is_connected());
    assert!(!m.port(tank, "P1").unwrap().is_connected());
    assert_ne!(m.node_of_port(vol, "P2"), m.node_of_port(tank, "P1"));
    assert!(before_vol.is_some() && before_tank.is_some());
    let errors = drain_of(&m, MessageKind::Error);
    assert!(has_message(&errors, "two C-Component power ports"));
}

#[test]
fn q_to_q_is_rejected() {
    let mut m = new_model("QQ");
    let root = m.root();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();
    let orifice = m.add_component(root, HYDRAULIC_LAMINAR_ORIFICE, "").unwrap();

    let err = m.connect(pump, "P2", orifice, "P1").unwrap_err();
    assert!(matches!(err, KernelError::InvalidConnection(_)));
    assert!(!m.port(pump, "P2").unwrap().is_connected());
    assert!(!m.port(orifice, "P1").unwrap().is_connected());
}

#[test]
fn node_type_mismatch_is_rejected() {
    let mut m = new_model("Mismatch");
    let root = m.root();
    let k = m.add_component(root, SIGNAL_CONSTANT, "").unwrap();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();
    assert!(matches!(
        m.connect(k, "out", vol, "P1"),
        Err(KernelError::NodeTypeMismatch { .. })
    ));
}

#[test]
fn self_and_same_component_connections_are_rejected() {
    let mut m = new_model("Self");
    let root = m.root();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();
    assert!(m.connect(vol, "P1", vol, "P1").is_err());
    assert!(m.connect(vol, "P1", vol, "P2").is_err());
}

#[test]
fn second_writer_on_a_node_is_rejected() {
    let mut m = new_model("Writers");
    let root = m.root();
    let k1 = m.add_component(root, SIGNAL_CONSTANT, "").unwrap();
    let k2 = m.add_component(root, SIGNAL_CONSTANT, "").unwrap();
    let gain = m.add_component(root, SIGNAL_GAIN, "").unwrap();

    m.connect(k1, "out", gain, "in").unwrap();
    assert!(m.connect(k2, "out", gain, "in").is_err());
    assert!(!m.port(k2, "out").unwrap().is_connected());
    assert!(m.port(k1, "out").unwrap().is_connected());
}

#[test]
fn multiport_fans_out_into_independent_nodes() {
    let mut m = new_model("Fan");
    let root = m.root();
    let sum = m.add_component(root, SIGNAL_SUM, "").unwrap();
    let sources: Vec<_> = (0..3)
        .map(|i| m.add_component(root, SIGNAL_CONSTANT, &format!("K{i}")).unwrap())
        .collect();
    for k in &sources {
        m.connect(*k, "out", sum, "in").unwrap();
    }

    let port = m.port(sum, "in").unwrap();
    assert_eq!(port.kind(), PortKind::ReadMulti);
    assert_eq!(port.num_ports(), 3);
    let mut nodes: Vec<_> = port.sub_ports().iter().filter_map(|s| s.link().node()).collect();
    nodes.sort();
    nodes.dedup();
    assert_eq!(nodes.len(), 3);
    for k in &sources {
        let n = m.node_of_port(*k, "out").unwrap();
        assert!(nodes.contains(&n));
    }

    // 断开一路只删除对应的子端口
    m.disconnect(sources[1], "out", sum, "in").unwrap();
    assert_eq!(m.port(sum, "in").unwrap().num_ports(), 2);
    assert!(!m.port(sources[1], "out").unwrap().is_connected());
}

#[test]
fn power_multiport_gives_each_c_component_its_own_node() {
    let mut registry = registry();
    register_junction(&mut registry);
    let mut m = Model::new("Junction", Arc::new(registry));
    let root = m.root();
    let junction = m.add_component(root, "Junction", "").unwrap();
    let volumes: Vec<_> = (0..4)
        .map(|i| m.add_component(root, HYDRAULIC_VOLUME, &format!("V{i}")).unwrap())
        .collect();
    let nodes_before = m.num_nodes();
    let root_nodes_before = m.system_data(root).unwrap().sub_nodes().len();

    for v in &volumes {
        m.connect(*v, "P1", junction, "P").unwrap();
    }

    let port = m.port(junction, "P").unwrap();
    assert_eq!(port.kind(), PortKind::PowerMulti);
    assert_eq!(port.num_ports(), volumes.len());
    let subs: Vec<_> = port.sub_ports().iter().filter_map(|s| s.link().node()).collect();
    assert_eq!(subs.len(), volumes.len());
    for (v, node) in volumes.iter().zip(&subs) {
        assert_eq!(m.node_of_port(*v, "P1"), Some(*node));
        assert_eq!(m.node(*node).unwrap().num_connected_ports(), 2);
    }
    let mut distinct = subs.clone();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), volumes.len());
    assert_eq!(m.num_nodes(), nodes_before);

    // 每个子端口的节点只属于一路：改写一路不影响其它路
    assert!(m.write_node_safe(volumes[0], "P1", 1, 7.0e5));
    assert_ne!(m.read_node_safe(volumes[1], "P1", 1), Some(7.0e5));

    for (i, v) in volumes.iter().enumerate() {
        m.disconnect(*v, "P1", junction, "P").unwrap();
        assert_eq!(m.port(junction, "P").unwrap().num_ports(), volumes.len() - i - 1);
        assert!(!m.port(*v, "P1").unwrap().is_connected());
    }
    assert_eq!(m.num_nodes(), nodes_before);
    assert_eq!(m.system_data(root).unwrap().sub_nodes().len(), root_nodes_before);
    assert!(m.port(junction, "P").unwrap().sub_ports().is_empty());
}

#[test]
fn reconnecting_reuses_freed_node_slots() {
    let mut m = new_model("Cycle");
    let root = m.root();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();
    m.connect(pump, "P2", vol, "P1").unwrap();
    m.disconnect(pump, "P2", vol, "P1").unwrap();
    let arena = m.nodes.len();
    let live = m.num_nodes();

    for _ in 0..50 {
        m.connect(pump, "P2", vol, "P1").unwrap();
        m.disconnect(pump, "P2", vol, "P1").unwrap();
    }
    assert_eq!(m.nodes.len(), arena);
    assert_eq!(m.num_nodes(), live);
    assert_ne!(m.node_of_port(pump, "P2"), m.node_of_port(vol, "P1"));
}

#[test]
fn read_port_cannot_join_a_multiport_directly() {
    let mut m = new_model("ReadMulti");
    let root = m.root();
    let sum = m.add_component(root, SIGNAL_SUM, "").unwrap();
    let gain = m.add_component(root, SIGNAL_GAIN, "").unwrap();
    assert!(m.connect(gain, "in", sum, "in").is_err());
    assert_eq!(m.port(sum, "in").unwrap().num_ports(), 0);
}

#[test]
fn disconnect_splits_the_node_and_keeps_values() {
    let mut m = new_model("Split");
    let root = m.root();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();
    let vol = m.add_component(root, HYDRAULIC_VOLUME, "").unwrap();
    m.connect(pump, "P2", vol, "P1").unwrap();
    assert!(m.write_node_safe(vol, "P1", 1, 3.0e6));

    m.disconnect(pump, "P2", vol, "P1").unwrap();

    let a = m.node_of_port(pump, "P2").unwrap();
    let b = m.node_of_port(vol, "P1").unwrap();
    assert_ne!(a, b);
    assert_eq!(m.read_node_safe(pump, "P2", 1), Some(3.0e6));
    assert_eq!(m.read_node_safe(vol, "P1", 1), Some(3.0e6));
    assert!(matches!(
        m.disconnect(pump, "P2", vol, "P1"),
        Err(KernelError::NotConnected(_))
    ));
}

#[test]
fn system_ports_pass_connections_through() {
    let mut m = new_model("Nested");
    let root = m.root();
    let sub = m.add_subsystem(root, "Sub").unwrap();
    let port = m.add_system_port(sub, "PIn").unwrap();
    let vol = m.add_component(sub, HYDRAULIC_VOLUME, "").unwrap();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();

    m.connect(vol, "P1", sub, &port).unwrap();
    m.connect(pump, "P2", sub, &port).unwrap();

    // 系统端口对节点透明：泵与容腔共享同一个节点
    assert_eq!(m.node_of_port(pump, "P2"), m.node_of_port(vol, "P1"));
    assert!(m.port(sub, &port).unwrap().is_connected());
    // 子系统只通过 C 组件对外连接，因此是 C
    assert_eq!(m.component(sub).unwrap().cqs(), crate::component::CqsRole::C);
}

#[test]
fn connections_across_hierarchy_levels_are_rejected() {
    let mut m = new_model("Cross");
    let root = m.root();
    let sub = m.add_subsystem(root, "Sub").unwrap();
    let vol = m.add_component(sub, HYDRAULIC_VOLUME, "").unwrap();
    let pump = m.add_component(root, HYDRAULIC_FIXED_DISPLACEMENT_PUMP, "").unwrap();
    assert!(m.connect(pump, "P2", vol, "P1").is_err());
}

#[test]
fn sub_ports_get_fresh_ids_and_can_be_removed() {
    let mut port = Port::new(
        "P",
        PortKind::PowerMulti,
        Some("NodeHydraulic".to_string()),
        PortRequirement::NotRequired,
    );
    let a = port.add_sub_port();
    let b = port.add_sub_port();
    assert_ne!(a, b);
    assert_eq!(port.num_ports(), 2);
    assert!(!port.is_connected());

    assert_eq!(port.remove_sub_port(a).map(|s| s.id()), Some(a));
    assert!(port.remove_sub_port(a).is_none());
    let c = port.add_sub_port();
    assert!(c != a && c != b);
    assert_eq!(port.num_ports(), 2);
}
