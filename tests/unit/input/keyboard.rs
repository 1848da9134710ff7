use super::*;

#[test]
fn release_is_visible_for_one_frame() {
    let mut k = KeyboardState::default();
    k.key_down("ArrowLeft");
    k.key_down("ArrowLeft");
    assert!(k.is_pressed("ArrowLeft"));
    assert_eq!(k.pressed_keys().count(), 1);

    k.key_up("ArrowLeft");
    assert!(!k.is_pressed("ArrowLeft"));
    assert!(k.was_released("ArrowLeft"));

    k.end_frame();
    assert!(!k.was_released("ArrowLeft"));
}

#[test]
fn blur_releases_everything() {
    let mut k = KeyboardState::default();
    k.key_down("a");
    k.key_down(" ");
    k.blur();
    assert_eq!(k.pressed_keys().count(), 0);
    assert!(k.was_released("a"));
    assert!(k.was_released(" "));
}
