use consent_mode::logging::init_logging;
use consent_mode::{ConsentConfig, ConsentError, LogLevel, Zone};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsentConfig { log_level: LogLevel::Debug, ..Default::default() };
    init_logging(config.log_level);

    let origin = url::Url::parse("https://shop.example")?.origin();
    let mut zone = Zone::new(origin, config)?;

    // The visitor accepted analytics but not advertising on an earlier visit.
    let first = zone.open_tab()?;
    zone.set_cookie(first, "cookieyes-consent=consentid:abc,consent:yes,action:yes,necessary:yes,functional:no,analytics:yes,advertisement:no; Path=/")?;

    // A second tab reads the decision on load.
    let second = zone.open_tab()?;

    // The visitor opens the preference modal in the first tab and allows advertising.
    zone.set_cookie(first, "cookieyes-consent=consentid:abc,consent:yes,action:yes,necessary:yes,functional:no,analytics:yes,advertisement:yes; Path=/")?;

    // Deliver cross-tab messages, as the event loop of the second tab would.
    tokio::task::yield_now().await;
    zone.pump_channel_messages();

    for tab_id in [first, second] {
        let tab = zone.tab(tab_id).ok_or(ConsentError::InvalidTabId)?;
        println!("tab {}:", tab_id);
        for entry in tab.data_layer().entries() {
            println!("  dataLayer.push({})", entry);
        }
    }

    Ok(())
}
