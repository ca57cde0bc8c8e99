//! Performance benchmarks for critical game systems

use client::reconciler::{Frame, Reconciler};
use server::room::{Room, RoomCommand};
use shared::geometry::{point_in_polygon, polygon_union, segment_intersection};
use shared::{Direction, GameConfig, Packet, Point, SnakeConfig, SnakePoint, SnakeState};
use std::time::Instant;

const TICK: f64 = 1000.0 / 60.0;

fn busy_room(players: u32) -> Room {
    let mut room = Room::with_seed(GameConfig::default(), 3);
    for id in 1..=players {
        room.add_player(id);
        room.enqueue(RoomCommand::Join {
            player_id: id,
            name: format!("bench {}", id),
            skin: "pattern_grid".to_string(),
        });
    }
    room.tick(TICK);
    room
}

/// A snake that left its start square upwards and has just come back in.
fn returning_snake() -> SnakeState {
    let mut snake = SnakeState::spawn(Point::new(0.0, 0.0), 0, 0.0, &SnakeConfig::default());
    snake.points = vec![
        SnakePoint::new(Point::new(50.0, -90.0), 3, Direction::Down, 300.0),
        SnakePoint::new(Point::new(50.0, -150.0), 2, Direction::Down, 300.0),
        SnakePoint::new(Point::new(-50.0, -150.0), 1, Direction::Right, 200.0),
        SnakePoint::new(Point::new(-50.0, -50.0), 0, Direction::Up, 0.0),
    ];
    snake.direction = Direction::Down;
    snake.length = 1000.0;
    snake
}

/// Benchmarks segment intersection, the core of every collision test
#[test]
fn benchmark_segment_intersection() {
    let iterations = 100_000;
    let start = Instant::now();

    let mut hits = 0;
    for i in 0..iterations {
        let offset = (i % 100) as f64;
        if segment_intersection(
            Point::new(offset, -50.0),
            Point::new(offset, 50.0),
            Point::new(-10.0, 0.0),
            Point::new(200.0, 0.0),
        )
        .is_some()
        {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Segment intersection: {} iterations in {:?} ({:.2} ns/iter)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(hits, iterations);
    // Should complete in under 500ms for 100k iterations
    assert!(duration.as_millis() < 500);
}

/// Benchmarks point-in-polygon against a many-sided territory outline
#[test]
fn benchmark_point_in_polygon() {
    let polygon: Vec<Point> = (0..64)
        .map(|i| {
            let angle = i as f64 / 64.0 * std::f64::consts::TAU;
            Point::new(angle.cos() * 200.0, angle.sin() * 200.0)
        })
        .collect();

    let iterations = 100_000;
    let start = Instant::now();

    let mut inside = 0;
    for i in 0..iterations {
        let x = (i % 500) as f64 - 250.0;
        if point_in_polygon(Point::new(x, 0.0), &polygon) {
            inside += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Point in polygon: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(inside > 0 && inside < iterations);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks the full loop-closing construction
#[test]
fn benchmark_territory_claim() {
    let snake = returning_snake();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let claimed = snake.try_claim_region(400.0).unwrap();
        assert!(!claimed.is_empty());
    }

    let duration = start.elapsed();
    println!(
        "Territory claim: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks unioning many overlapping regions
#[test]
fn benchmark_polygon_union() {
    let squares: Vec<Vec<Point>> = (0..20)
        .map(|i| {
            let x = i as f64 * 30.0;
            vec![
                Point::new(x, 0.0),
                Point::new(x + 50.0, 0.0),
                Point::new(x + 50.0, 50.0),
                Point::new(x, 50.0),
            ]
        })
        .collect();

    let iterations = 500;
    let start = Instant::now();

    for _ in 0..iterations {
        let rings = polygon_union(&squares);
        assert_eq!(rings.len(), 1);
    }

    let duration = start.elapsed();
    println!(
        "Polygon union: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks room ticks with a full lobby
#[test]
fn benchmark_room_tick() {
    let mut room = busy_room(20);

    let ticks = 300;
    let start = Instant::now();

    for _ in 0..ticks {
        room.tick(TICK);
    }

    let duration = start.elapsed();
    println!(
        "Room tick: {} ticks with 20 players in {:?} ({:.2} μs/tick)",
        ticks,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert_eq!(room.tick_count(), ticks + 1);
    // 5 simulated seconds should run well under 5 real seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks snapshot serialization for a full room
#[test]
fn benchmark_snapshot_serialization() {
    use bincode::{deserialize, serialize};

    let mut room = busy_room(20);
    for _ in 0..60 {
        room.tick(TICK);
    }
    let packet = room.snapshot();

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Snapshot serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks per-render-frame reconciliation for a full room
#[test]
fn benchmark_reconciler_view() {
    let mut room = busy_room(20);
    let mut reconciler = Reconciler::new(&room.config().net);

    for _ in 0..2 {
        for _ in 0..3 {
            room.tick(TICK);
        }
        if let Packet::GameState {
            tick,
            timestamp,
            half_size,
            players,
            food,
        } = room.snapshot()
        {
            reconciler.push_frame(Frame {
                server_time: timestamp,
                received_at: timestamp,
                tick,
                half_size,
                players,
                food,
            });
        }
    }

    let (older, newer) = (
        reconciler.newest().unwrap().server_time - 3.0 * TICK,
        reconciler.newest().unwrap().server_time,
    );

    let iterations = 10_000;
    let start = Instant::now();

    for i in 0..iterations {
        let target = older + (newer - older) * (i % 100) as f64 / 100.0;
        let view = reconciler.view_at(target).unwrap();
        assert_eq!(view.players.len(), 20);
    }

    let duration = start.elapsed();
    println!(
        "Reconciler view: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(reconciler.len(), 2);
    // Should complete in under 3 seconds
    assert!(duration.as_millis() < 3000);
}
