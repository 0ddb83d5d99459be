use glam::{Vec2, Vec3};
use treectl::{
    carousel::{CardFace, PhotoTexture},
    config::SceneConfig,
    gestures::Gesture,
    hand_state::HandState,
    scene::Scene,
};

const DT: f32 = 1.0 / 60.0;
const EPS: f32 = 1e-2;
const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

fn config() -> SceneConfig {
    let mut cfg = SceneConfig::default();
    cfg.scene.seed = Some(2024);
    cfg.scene.particle_count = 200;
    cfg
}

fn hand(gesture: Gesture) -> HandState {
    HandState {
        gesture,
        hand_position: Vec2::ZERO,
        is_present: gesture != Gesture::None,
        sequence: 0,
    }
}

fn run(scene: &mut Scene, gesture: Gesture, ticks: usize) {
    let h = hand(gesture);
    for _ in 0..ticks {
        scene.tick(&h, DT);
    }
}

fn assert_near(a: Vec3, b: Vec3, what: &str) {
    assert!(a.distance(b) < EPS, "{what}: {a} vs {b}");
}

#[test]
fn default_counts_per_class() {
    let scene = Scene::new(&config()).unwrap();
    let count = |kind: &str| {
        scene
            .ornaments()
            .iter()
            .filter(|o| serde_json::to_value(o.kind()).unwrap() == kind)
            .count()
    };
    assert_eq!(count("gift"), 50);
    assert_eq!(count("bauble"), 150);
    assert_eq!(count("light"), 300);
    assert_eq!(scene.carousel().len(), 30);
}

#[test]
fn fist_assembles_the_tree() {
    let mut scene = Scene::new(&config()).unwrap();
    assert_eq!(scene.animation().blend_factor, 0.0);
    run(&mut scene, Gesture::Fist, 500);

    assert!((scene.animation().blend_factor - 1.0).abs() < 1e-4);
    for (i, o) in scene.ornaments().iter().enumerate() {
        assert_near(o.current_position, o.target_position(), &format!("ornament {i}"));
    }
    for (i, c) in scene.carousel().cards().iter().enumerate() {
        assert_near(c.ornament.current_position, c.ornament.target_position(), &format!("card {i}"));
    }
}

#[test]
fn open_scatters_from_the_tree() {
    let mut scene = Scene::new(&config()).unwrap();
    scene.snap_to(1.0);
    run(&mut scene, Gesture::Open, 500);

    assert!(scene.animation().blend_factor < 1e-4);
    for (i, o) in scene.ornaments().iter().enumerate() {
        assert_near(o.current_position, o.chaos_position(), &format!("ornament {i}"));
    }
}

#[test]
fn losing_the_hand_reforms_the_tree() {
    let mut scene = Scene::new(&config()).unwrap();
    run(&mut scene, Gesture::Open, 10);
    assert_eq!(scene.animation().target_blend, 0.0);
    run(&mut scene, Gesture::None, 1);
    assert_eq!(scene.animation().target_blend, 1.0);
}

#[test]
fn gun_edges_step_the_carousel() {
    let mut scene = Scene::new(&config()).unwrap();
    let seq = [
        Gesture::None,
        Gesture::Gun,
        Gesture::Gun,
        Gesture::Gun,
        Gesture::Open,
        Gesture::Gun,
    ];
    for g in seq {
        scene.tick(&hand(g), DT);
    }
    assert_eq!(scene.animation().active_carousel_index, 2);
    assert_eq!(scene.inspecting(), Some(2));

    let frame = scene.tick(&hand(Gesture::Gun), DT);
    let inspected: Vec<_> = frame.cards.iter().filter(|c| c.inspecting).map(|c| c.index).collect();
    assert_eq!(inspected, [2]);

    scene.tick(&hand(Gesture::Fist), DT);
    assert_eq!(scene.inspecting(), None);
    assert_eq!(scene.animation().active_carousel_index, 2);
}

#[test]
fn inspected_card_comes_to_the_camera() {
    let mut scene = Scene::new(&config()).unwrap();
    run(&mut scene, Gesture::Gun, 300);
    let cam = scene.camera();
    let card = &scene.carousel().cards()[1];
    let pose = cam.position + cam.forward * 6.0 + cam.right * 3.0;
    assert_near(card.ornament.current_position, pose, "inspected card");
    assert!((card.scale() - 2.5).abs() < EPS);
}

#[test]
fn uploads_fill_leading_cards() {
    let mut scene = Scene::new(&config()).unwrap();
    let images = (0..3)
        .map(|i| PhotoTexture::from_bytes(format!("p{i}.png"), PNG.to_vec()))
        .collect();
    let report = scene.upload(images);
    assert_eq!(report.applied, [0, 1, 2]);

    let cards = scene.carousel().cards();
    for c in &cards[..3] {
        assert!(matches!(c.face(), CardFace::Photo(_)));
    }
    for (i, c) in cards.iter().enumerate().skip(3) {
        assert_eq!(c.face(), &CardFace::placeholder(i), "card {i}");
    }
    assert_eq!(scene.status().photo_count, 3);

    // Popped cards hold their enlarged scale for a moment, then settle.
    scene.tick(&hand(Gesture::None), DT);
    assert!((scene.carousel().cards()[0].scale() - 1.8).abs() < 1e-6);
    run(&mut scene, Gesture::None, 600);
    assert!((scene.carousel().cards()[2].scale() - 1.0).abs() < EPS);
}

#[test]
fn same_seed_same_scene() {
    let a = Scene::new(&config()).unwrap();
    let b = Scene::new(&config()).unwrap();
    assert_eq!(a.particles(), b.particles());
    assert_eq!(a.ornaments(), b.ornaments());

    let mut other = config();
    other.scene.seed = Some(7);
    let c = Scene::new(&other).unwrap();
    assert_ne!(a.particles(), c.particles());
}
