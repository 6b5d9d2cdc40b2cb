use shared::{
    domain::{Entity, EntityId},
    error::ContractViolation,
};

/// Records the console starts with: tourist bookmarks, report cards and news.
pub fn sample_entities() -> Result<Vec<Entity>, ContractViolation> {
    Ok(vec![
        Entity::new(EntityId::parse("site-42")?, "bookmark", "Colosseum")
            .with_attribute("city", "Rome")
            .with_attribute("category", "monument"),
        Entity::new(EntityId::parse("site-7")?, "bookmark", "Pantheon")
            .with_attribute("city", "Rome")
            .with_attribute("category", "temple"),
        Entity::new(EntityId::parse("site-9")?, "bookmark", "Trevi Fountain")
            .with_attribute("city", "Rome")
            .with_attribute("category", "fountain"),
        Entity::new(EntityId::parse("card-3")?, "report_card", "Rossi, Term 2")
            .with_attribute("class", "3B")
            .with_attribute("average", "7.5"),
        Entity::new(EntityId::parse("news-1")?, "news", "Open day")
            .with_attribute("title", "Open day")
            .with_attribute("author", "secretariat"),
        Entity::new(EntityId::parse("teaching-5")?, "teaching", "Mathematics")
            .with_attribute("hours", "4"),
    ])
}
