use super::*;

#[test]
fn builder_collects_props_and_children() {
    let el = Element::game().child(
        Element::layer("ui").child(Element::sprite().key("hud").prop("x", 4).prop("visible", false)),
    );
    assert_eq!(el.subtree_len(), 3);
    let layer = &el.children[0];
    assert_eq!(layer.props.get("name"), Some(&PropValue::Text("ui".into())));
    let hud = &layer.children[0];
    assert_eq!(hud.key.as_deref(), Some("hud"));
    assert_eq!(hud.props.get("x").and_then(PropValue::as_f64), Some(4.0));
    assert_eq!(hud.props.get("visible").and_then(PropValue::as_bool), Some(false));
}

#[test]
fn parses_json_tree() {
    let el = Element::from_json_str(
        r##"{
            "type": "game",
            "children": [
                { "type": "scene", "props": { "backgroundColor": "#000" },
                  "children": [
                      { "type": "sprite", "key": "a", "props": { "x": 10, "texture": "hero" },
                        "animation": { "from": { "x": 0 }, "to": { "x": 100 }, "duration": 2, "loop": true } }
                  ] }
            ]
        }"##,
    )
    .unwrap();

    assert_eq!(el.kind, "game");
    let sprite = &el.children[0].children[0];
    assert_eq!(sprite.props.get("texture").and_then(PropValue::as_str), Some("hero"));
    let anim = sprite.animation.as_ref().unwrap();
    assert_eq!(anim.duration, 2.0);
    assert!(anim.looping);
    assert!(anim.auto_start);
    assert!(sprite.interactive.is_none());
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = Element::from_json_str("{ \"type\": ").unwrap_err();
    assert!(err.to_string().contains("serialization error:"));
}
