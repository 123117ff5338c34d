use std::time::Duration;

use victread::{DeviceModel, VictronClient};

#[tokio::main]
pub async fn main() {
    tracing_subscriber::fmt::init();

    let name = std::env::args().nth(1).unwrap_or_else(|| "SmartShunt HQ2027ABCDE".to_owned());
    let mut client = VictronClient::new(&name, DeviceModel::Smartshunt).await.unwrap();
    loop {
        let mut values = Vec::new();
        client.read_for(Duration::from_secs(10), &mut values).await.unwrap();
        for value in values {
            println!("{value}");
        }
    }
}
