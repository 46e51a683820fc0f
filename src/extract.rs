//! Maps the listing elements of a rendered result page to [`ListingRecord`]s.

use crate::config::{ListingSelectors, MalformedListingPolicy};
use crate::error::{ConfigError, ExtractError};
use crate::price;
use crate::results::ListingRecord;
use scraper::{ElementRef, Html, Selector};

/// Records read from one page snapshot
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageExtract {
    pub records: Vec<ListingRecord>,
    pub skipped: usize,
}

/// Selector set compiled once per traversal.
///
/// Each field has its own accessor so a layout change fails on exactly the
/// field that moved.
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    listing: Selector,
    name: Selector,
    price: Selector,
    location: Selector,
    first_registration: Selector,
    mileage: Selector,
    offer_number: Selector,
    fuel: Selector,
    power: Selector,
    body_type: Selector,
    transmission: Selector,
    image: Selector,
    discount_percent: f64,
    policy: MalformedListingPolicy,
}

fn compile(field: &'static str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector).map_err(|_| ConfigError::InvalidSelector {
        field,
        selector: selector.to_string(),
    })
}

impl ListingExtractor {
    pub fn new(
        selectors: &ListingSelectors,
        discount_percent: f64,
        policy: MalformedListingPolicy,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            listing: compile("listing", &selectors.listing)?,
            name: compile("name", &selectors.name)?,
            price: compile("price", &selectors.price)?,
            location: compile("location", &selectors.location)?,
            first_registration: compile("first_registration", &selectors.first_registration)?,
            mileage: compile("mileage", &selectors.mileage)?,
            offer_number: compile("offer_number", &selectors.offer_number)?,
            fuel: compile("fuel", &selectors.fuel)?,
            power: compile("power", &selectors.power)?,
            body_type: compile("body_type", &selectors.body_type)?,
            transmission: compile("transmission", &selectors.transmission)?,
            image: compile("image", &selectors.image)?,
            discount_percent,
            policy,
        })
    }

    /// Extracts all listings from a serialized page in DOM order
    pub fn extract(&self, html: &str) -> Result<PageExtract, ExtractError> {
        let doc = Html::parse_document(html);
        let mut page = PageExtract::default();

        for (i, element) in doc.select(&self.listing).enumerate() {
            let position = i + 1;
            match self.map_listing(element, position) {
                Ok(record) => page.records.push(record),
                Err(e) if self.policy == MalformedListingPolicy::Skip => {
                    ::log::warn!("Skipping malformed listing: {}", e);
                    page.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        ::log::debug!(
            "Extracted {} listings ({} skipped)",
            page.records.len(),
            page.skipped
        );

        Ok(page)
    }

    fn map_listing(&self, listing: ElementRef, position: usize) -> Result<ListingRecord, ExtractError> {
        let text = |selector: &Selector, field: &'static str| {
            read_text(listing, selector).ok_or(ExtractError::MissingField {
                listing: position,
                field,
            })
        };

        let name = text(&self.name, "name")?;
        let displayed_price = text(&self.price, "price")?;
        let location = text(&self.location, "location")?;
        let first_registration = text(&self.first_registration, "first_registration")?;
        let mileage = text(&self.mileage, "mileage")?;
        let offer_number = text(&self.offer_number, "offer_number")?;
        let fuel = text(&self.fuel, "fuel")?;
        let power = text(&self.power, "power")?;
        let body_type = text(&self.body_type, "body_type")?;
        let transmission = text(&self.transmission, "transmission")?;

        let image = listing
            .select(&self.image)
            .next()
            .ok_or(ExtractError::MissingField {
                listing: position,
                field: "image",
            })?;
        let image_url = image
            .value()
            .attr("src")
            .ok_or(ExtractError::MissingAttribute {
                listing: position,
                field: "image",
                attribute: "src",
            })?
            .to_string();

        let prices = price::discount_display_price(&displayed_price, self.discount_percent)
            .map_err(|source| ExtractError::MalformedPrice {
                listing: position,
                source,
            })?;

        Ok(ListingRecord {
            name,
            price: prices.original,
            discounted_price: prices.discounted,
            location,
            first_registration,
            mileage,
            offer_number,
            fuel,
            power,
            body_type,
            transmission,
            image_url,
        })
    }
}

/// Text content of the first match with whitespace collapsed
fn read_text(root: ElementRef, selector: &Selector) -> Option<String> {
    root.select(selector).next().map(|element| {
        element
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    })
}
