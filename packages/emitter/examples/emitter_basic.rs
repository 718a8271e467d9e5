//! Demonstrates the three listening modes of a single-threaded emitter.

use emitter::{LocalEmitter, LocalListener};

fn main() {
    let emitter = LocalEmitter::<String>::new();

    let log = LocalListener::new(|payload| match payload.data() {
        Some(data) => println!("log: received data {data:?}"),
        None => println!("log: received event {:?}", payload.event_type()),
    });

    let unlisten = emitter.on("message_received", &log);

    emitter.once(
        "message_received",
        &LocalListener::new(|_| println!("once: first message seen")),
    );

    emitter.race(&[
        ("success", &LocalListener::new(|_| println!("race: success won"))),
        ("failure", &LocalListener::new(|_| println!("race: failure won"))),
    ]);

    emitter.emit_with("message_received", "hello".to_string());
    emitter.emit("message_received");

    emitter.emit("failure");
    emitter.emit("success");

    unlisten.unlisten();
    emitter.emit_with("message_received", "nobody hears this".to_string());

    println!("events with listeners: {:?}", emitter.event_names());
}
