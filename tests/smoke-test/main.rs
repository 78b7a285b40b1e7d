use std::{io, time::Duration};

use autolog::{
    params, AttributeTable, Dialect, Level, LogAttribute, LoggingConfig, MethodIdentity, Sink,
};

const CONFIG: &str = r#"{
    "default_target": "app",
    "auto_detect": true,
    "templates": {
        "order": "Order {orderId} placed for {customer} in {Duration}ms"
    },
    "rules": [
        { "pattern": "Orders.Place", "template_name": "order", "formatter_type": "Template" },
        { "pattern": "Health.*", "enabled": false },
        { "pattern": "Reports.*", "formatter_type": "Json", "target": "reports" }
    ]
}"#;

#[tokio::main]
async fn main() {
    autolog::runtime::init_internal(autolog_term::stdout().with_min_level(Level::Debug));

    let config: LoggingConfig = serde_json::from_str(CONFIG).unwrap();

    let init = autolog::setup()
        .config(config)
        .attributes(AttributeTable::new().with_method(
            "Users",
            "Get",
            LogAttribute::new().with_level(Level::Debug),
        ))
        .sink(autolog_term::stdout())
        .target("reports", autolog_term::stdout().with_dialect(Dialect::Rust))
        .spawn()
        .unwrap();

    let interceptor = init.interceptor();

    let place_order = MethodIdentity::new("Orders", "Place");
    let get_user = MethodIdentity::new("Users", "Get");
    let check = MethodIdentity::new("Health", "Check");
    let monthly = MethodIdentity::new("Reports", "Monthly");
    let divide = MethodIdentity::new("Math", "Divide");

    for i in 0..3 {
        let _ = interceptor.intercept(
            &place_order,
            || params! { orderId: i, customer: "bob" },
            || Ok::<_, io::Error>(i * 10),
        );

        let _ = interceptor.intercept(
            &get_user,
            || params! { id: i },
            || Ok::<_, io::Error>(format!("user-{i}")),
        );

        let _ = interceptor.intercept(&check, || params! {}, || Ok::<_, io::Error>(true));

        let _ = interceptor.intercept(
            &monthly,
            || params! { month: i + 1 },
            || Ok::<_, io::Error>(vec![1.5, 2.5]),
        );

        let _ = interceptor.intercept(
            &divide,
            || params! { a: 1, b: 0 },
            || Err::<i32, _>(io::Error::new(io::ErrorKind::Other, "division by zero")),
        );
    }

    init.blocking_flush(Duration::from_secs(5));

    for metric in init.sample_metrics() {
        println!("{}: {}", metric.name, metric.value);
    }

    init.close(Duration::from_secs(5));
}
