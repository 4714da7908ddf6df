//! End-to-end scenarios for the per-frame light list build, exercising the
//! public API the way a renderer would: visible lights in, packed
//! GPU-ready arrays out.

use glam::{Mat4, Vec3};
use tilecull::lights::classify::{classify_lights, decode_light_key};
use tilecull::lights::types::{LightArchetype, LightConfig, LightKind};
use tilecull::{
    prepare_lights_for_gpu, CameraInfo, DirectionalShadowInfo, LightLoopSettings, VisibleLight,
    VisibleReflectionProbe,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn identity_camera() -> CameraInfo {
    CameraInfo {
        world_to_view: Mat4::IDENTITY,
        projection: Mat4::perspective_lh(std::f32::consts::FRAC_PI_3, 16.0 / 9.0, 0.1, 1000.0),
        position: Vec3::ZERO,
        near: 0.1,
        far: 1000.0,
        pixel_width: 1920,
        pixel_height: 1080,
    }
}

fn directional() -> VisibleLight {
    VisibleLight {
        kind: LightKind::Directional,
        position: Vec3::new(0.0, 50.0, 0.0),
        forward: Vec3::new(0.0, -1.0, 0.0),
        up: Vec3::Z,
        right: Vec3::X,
        scale: Vec3::ONE,
        range: 0.0,
        spot_angle_deg: 0.0,
        color: Vec3::new(1.0, 0.95, 0.9),
        config: LightConfig::default(),
    }
}

fn point_at(position: Vec3, range: f32) -> VisibleLight {
    VisibleLight {
        kind: LightKind::Point,
        position,
        forward: Vec3::Z,
        up: Vec3::Y,
        right: Vec3::X,
        scale: Vec3::ONE,
        range,
        spot_angle_deg: 0.0,
        color: Vec3::ONE,
        config: LightConfig::default(),
    }
}

fn probe_with_slot(slot: Option<u32>) -> VisibleReflectionProbe {
    VisibleReflectionProbe {
        position: Vec3::new(0.0, 2.0, 5.0),
        forward: Vec3::Z,
        up: Vec3::Y,
        right: Vec3::X,
        box_extents: Vec3::splat(4.0),
        capture_offset: Vec3::ZERO,
        blend_distance: 1.0,
        box_projection: true,
        capture_slot: slot,
    }
}

#[test]
fn one_directional_one_point_under_identity_camera() {
    init_logging();
    let lights = vec![directional(), point_at(Vec3::new(0.0, 0.0, 20.0), 10.0)];

    let out = prepare_lights_for_gpu(
        &lights,
        &[],
        &identity_camera(),
        &DirectionalShadowInfo::default(),
        &LightLoopSettings::default(),
    );

    assert_eq!(out.directional_light_count, 1);
    assert_eq!(out.punctual_light_count, 1);

    // Exactly one volume pair, for the point light only.
    assert_eq!(out.list.bounds.len(), 1);
    assert_eq!(out.list.light_volumes.len(), 1);

    // Identity view: the sphere bound sits at the light, radius = range.
    let bound = &out.list.bounds[0];
    assert_eq!(bound.center, [0.0, 0.0, 20.0]);
    assert_eq!(bound.radius, 10.0);
    assert_eq!(out.list.light_volumes[0].radius_sq, 100.0);

    // Directional carries no shadow by default and keeps sentinel indices.
    assert_eq!(out.list.directional_lights[0].shadow_index, -1);
    assert_eq!(out.sun_light_index, Some(0));
}

#[test]
fn six_hundred_points_keep_the_smallest_keys() {
    init_logging();
    let lights: Vec<_> = (0..600)
        .map(|i| point_at(Vec3::new(i as f32, 0.0, 30.0), 5.0))
        .collect();

    let keys = classify_lights(&lights);
    assert_eq!(keys.len(), 512);
    // Identical classification means ascending source order survives.
    for (slot, key) in keys.iter().enumerate() {
        assert_eq!(decode_light_key(*key).index, slot);
    }

    let out = prepare_lights_for_gpu(
        &lights,
        &[],
        &identity_camera(),
        &DirectionalShadowInfo::default(),
        &LightLoopSettings::default(),
    );
    assert_eq!(out.punctual_light_count, 512);
    assert_eq!(out.list.lights.len(), 512);
    assert_eq!(out.list.bounds.len(), 512);
}

#[test]
fn probe_without_capture_texture_yields_no_env_light() {
    init_logging();
    let out = prepare_lights_for_gpu(
        &[],
        &[probe_with_slot(None)],
        &identity_camera(),
        &DirectionalShadowInfo::default(),
        &LightLoopSettings::default(),
    );
    assert_eq!(out.env_light_count, 0);
    assert!(out.list.env_lights.is_empty());
    assert!(out.list.bounds.is_empty());
    assert!(out.list.light_volumes.is_empty());
}

#[test]
fn volume_arrays_match_packed_light_count_for_mixed_frames() {
    init_logging();
    let mut lights = vec![
        directional(),
        point_at(Vec3::new(3.0, 1.0, 12.0), 8.0),
        point_at(Vec3::new(-3.0, 1.0, 12.0), 8.0),
    ];

    let mut spot = point_at(Vec3::new(0.0, 4.0, 10.0), 15.0);
    spot.kind = LightKind::Spot;
    spot.spot_angle_deg = 45.0;
    lights.push(spot);

    let mut area = point_at(Vec3::new(0.0, 6.0, 10.0), 6.0);
    area.config.archetype = LightArchetype::Area;
    area.config.width = 2.0;
    area.config.length = 1.0;
    lights.push(area);

    let mut projector = point_at(Vec3::new(5.0, 0.0, 8.0), 20.0);
    projector.kind = LightKind::Spot;
    projector.spot_angle_deg = 30.0;
    projector.config.archetype = LightArchetype::Projector;
    lights.push(projector);

    let probes = vec![probe_with_slot(Some(0)), probe_with_slot(Some(1))];

    let out = prepare_lights_for_gpu(
        &lights,
        &probes,
        &identity_camera(),
        &DirectionalShadowInfo::default(),
        &LightLoopSettings::default(),
    );

    let finite = out.punctual_light_count + out.area_light_count + out.projector_light_count;
    assert_eq!(out.list.lights.len(), finite);
    assert_eq!(out.list.env_lights.len(), out.env_light_count);
    assert_eq!(
        out.list.bounds.len(),
        out.list.lights.len() + out.list.env_lights.len()
    );
    assert_eq!(out.list.light_volumes.len(), out.list.bounds.len());

    // Env volumes sit after all light volumes and carry the env category.
    for volume in &out.list.light_volumes[out.env_index_shift()..] {
        assert_eq!(volume.light_category, 3);
    }
}

#[test]
fn rebuild_is_deterministic_across_frames() {
    init_logging();
    let lights: Vec<_> = (0..40)
        .map(|i| point_at(Vec3::new((i % 7) as f32, (i % 5) as f32, 10.0 + i as f32), 6.0))
        .collect();
    let probes = vec![probe_with_slot(Some(3))];
    let camera = identity_camera();
    let shadows = DirectionalShadowInfo::default();
    let settings = LightLoopSettings::default();

    let first = prepare_lights_for_gpu(&lights, &probes, &camera, &shadows, &settings);
    for _ in 0..3 {
        let again = prepare_lights_for_gpu(&lights, &probes, &camera, &shadows, &settings);
        assert_eq!(first.list.lights, again.list.lights);
        assert_eq!(first.list.bounds, again.list.bounds);
        assert_eq!(first.list.light_volumes, again.list.light_volumes);
        assert_eq!(first.list.env_lights, again.list.env_lights);
        assert_eq!(first.shadow_slots_used, again.shadow_slots_used);
    }
}

#[test]
fn degenerate_spot_angles_never_produce_nan() {
    init_logging();
    for angle in [0.0f32, 0.001, 1.0, 90.0, 179.0, 180.0] {
        let mut spot = point_at(Vec3::new(0.0, 0.0, 10.0), 10.0);
        spot.kind = LightKind::Spot;
        spot.spot_angle_deg = angle;

        let out = prepare_lights_for_gpu(
            &[spot],
            &[],
            &identity_camera(),
            &DirectionalShadowInfo::default(),
            &LightLoopSettings::default(),
        );
        assert_eq!(out.list.lights.len(), 1);

        let data = &out.list.lights[0];
        assert!(data.angle_scale.is_finite(), "angle {}", angle);
        assert!(data.angle_offset.is_finite(), "angle {}", angle);
        assert!(data.size[0].is_finite(), "angle {}", angle);

        let volume = &out.list.light_volumes[0];
        assert!(volume.cotan.is_finite(), "angle {}", angle);
        assert!(volume.cotan >= 0.0, "angle {}", angle);
        let bound = &out.list.bounds[0];
        for axis in [bound.box_axis_x, bound.box_axis_y, bound.box_axis_z, bound.center] {
            for c in axis {
                assert!(c.is_finite(), "angle {} gave component {}", angle, c);
            }
        }
    }
}

#[test]
fn shadow_budget_holds_across_a_full_frame() {
    init_logging();
    // 3 shadowed points (6 slots each) exceed the 16-slot budget at the
    // third request; everything after is denied.
    let mut lights: Vec<_> = (0..4)
        .map(|i| {
            let mut l = point_at(Vec3::new(i as f32, 0.0, 10.0), 8.0);
            l.config.shadows_enabled = true;
            l.config.shadow_slices = vec![Mat4::IDENTITY; 6];
            l
        })
        .collect();
    let mut spot = point_at(Vec3::new(9.0, 0.0, 10.0), 8.0);
    spot.kind = LightKind::Spot;
    spot.spot_angle_deg = 40.0;
    spot.config.shadows_enabled = true;
    spot.config.shadow_slices = vec![Mat4::IDENTITY];
    lights.push(spot);

    let out = prepare_lights_for_gpu(
        &lights,
        &[],
        &identity_camera(),
        &DirectionalShadowInfo::default(),
        &LightLoopSettings::default(),
    );

    let granted: Vec<_> = out
        .list
        .lights
        .iter()
        .filter(|l| l.shadow_index >= 0)
        .collect();
    assert_eq!(granted.len(), 2);
    assert_eq!(out.shadow_slots_used, 12);
    assert_eq!(out.list.shadows.len(), 12);
}
