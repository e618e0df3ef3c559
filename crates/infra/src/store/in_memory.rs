use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use chrono::Utc;
use tracing::{info, instrument};

use store_catalog::{
    Category, CategoryId, Comment, CommentId, CommentStatus, Discount, DiscountId, NewCategory,
    NewComment, NewDiscount, NewProduct, Price, Product, ProductId, ProductQuery,
};
use store_core::{Entity, OnDelete, RowKey};
use store_customers::{Address, Customer, CustomerId, NewAddress, NewCustomer};
use store_sales::{
    Cart, CartId, CartItem, CartItemId, NewCartItem, NewOrder, NewOrderItem, Order, OrderId,
    OrderItem, OrderItemId, OrderStatus,
};

use super::{OrderItemRow, ProductRow, ShopStore, StoreError, StoreResult};
use crate::pagination::Pagination;

/// One table keyed by a store-assigned integer id.
#[derive(Debug)]
struct Table<E: Entity>
where
    E::Id: RowKey,
{
    rows: BTreeMap<E::Id, E>,
    last_id: i64,
}

impl<E: Entity> Default for Table<E>
where
    E::Id: RowKey,
{
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            last_id: 0,
        }
    }
}

impl<E: Entity> Table<E>
where
    E::Id: RowKey,
{
    /// Next id; ids are never reused, even after deletes.
    fn allocate(&mut self) -> E::Id {
        self.last_id += 1;
        E::Id::from_raw(self.last_id)
    }

    fn insert(&mut self, row: E) {
        self.rows.insert(*row.id(), row);
    }

    fn get(&self, id: E::Id) -> StoreResult<&E> {
        self.rows.get(&id).ok_or(StoreError::NotFound)
    }

    fn get_mut(&mut self, id: E::Id) -> StoreResult<&mut E> {
        self.rows.get_mut(&id).ok_or(StoreError::NotFound)
    }

    fn contains(&self, id: E::Id) -> bool {
        self.rows.contains_key(&id)
    }

    fn remove(&mut self, id: E::Id) -> StoreResult<E> {
        self.rows.remove(&id).ok_or(StoreError::NotFound)
    }

    fn values(&self) -> impl Iterator<Item = &E> {
        self.rows.values()
    }

    fn count_where(&self, pred: impl Fn(&E) -> bool) -> usize {
        self.rows.values().filter(|r| pred(r)).count()
    }

    fn remove_where(&mut self, pred: impl Fn(&E) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, r| !pred(r));
        before - self.rows.len()
    }
}

/// Refuse a delete when a PROTECT relation still has dependents.
fn protect(policy: OnDelete, dependents: usize, entity: &str, dependent: &str) -> StoreResult<()> {
    if policy == OnDelete::Protect && dependents > 0 {
        return Err(StoreError::protected(entity, format!("{dependents} {dependent}")));
    }
    Ok(())
}

fn cascade<E: Entity>(policy: OnDelete, table: &mut Table<E>, references: impl Fn(&E) -> bool) -> usize
where
    E::Id: RowKey,
{
    match policy {
        OnDelete::Cascade => table.remove_where(references),
        OnDelete::Protect => 0,
    }
}

#[derive(Debug, Default)]
struct Tables {
    categories: Table<Category>,
    discounts: Table<Discount>,
    products: Table<Product>,
    comments: Table<Comment>,
    customers: Table<Customer>,
    addresses: BTreeMap<CustomerId, Address>,
    orders: Table<Order>,
    order_items: Table<OrderItem>,
    carts: BTreeMap<CartId, Cart>,
    cart_items: Table<CartItem>,
}

impl Tables {
    fn require_product(&self, id: ProductId) -> StoreResult<&Product> {
        self.products
            .get(id)
            .map_err(|_| StoreError::missing(format!("product {id}")))
    }

    fn require_discounts(&self, ids: &[DiscountId]) -> StoreResult<()> {
        match ids.iter().find(|id| !self.discounts.contains(**id)) {
            Some(id) => Err(StoreError::missing(format!("discount {id}"))),
            None => Ok(()),
        }
    }

    fn slug_taken(&self, slug: &str, except: Option<ProductId>) -> bool {
        self.products
            .values()
            .any(|p| p.slug.as_str() == slug && Some(p.id) != except)
    }

    fn build_order_item(
        &mut self,
        order_id: OrderId,
        new: NewOrderItem,
    ) -> StoreResult<OrderItem> {
        let price = self.require_product(new.product_id)?.price;
        let id = self.order_items.allocate();
        Ok(new.into_item(id, order_id, price))
    }

    fn touch_product(&mut self, id: ProductId, edit: impl FnOnce(&mut Product)) -> StoreResult<Product> {
        let product = self.products.get_mut(id)?;
        edit(product);
        product.modified_at = Utc::now();
        Ok(product.clone())
    }
}

/// In-memory shop store.
///
/// Intended for tests/dev. Every operation runs under one lock, so
/// multi-row writes (orders with items, cascades, the bulk inventory clear)
/// are observed all-or-nothing.
#[derive(Debug, Default)]
pub struct InMemoryShopStore {
    tables: RwLock<Tables>,
}

impl InMemoryShopStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&Tables) -> StoreResult<T>) -> StoreResult<T> {
        let tables = self
            .tables
            .read()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))?;
        f(&tables)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Tables) -> StoreResult<T>) -> StoreResult<T> {
        let mut tables = self
            .tables
            .write()
            .map_err(|_| StoreError::Database("lock poisoned".to_string()))?;
        f(&mut tables)
    }
}

#[async_trait::async_trait]
impl ShopStore for InMemoryShopStore {
    fn backend(&self) -> &'static str {
        "in-memory"
    }

    async fn insert_category(&self, new: NewCategory) -> StoreResult<Category> {
        new.validate()?;
        self.write(|t| {
            if let Some(product_id) = new.top_product_id {
                t.require_product(product_id)?;
            }
            let category = new.into_category(t.categories.allocate());
            t.categories.insert(category.clone());
            Ok(category)
        })
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Category> {
        self.read(|t| t.categories.get(id).cloned())
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        self.read(|t| Ok(t.categories.values().cloned().collect()))
    }

    async fn set_top_product(
        &self,
        id: CategoryId,
        product_id: Option<ProductId>,
    ) -> StoreResult<Category> {
        self.write(|t| {
            if let Some(product_id) = product_id {
                t.require_product(product_id)?;
            }
            let category = t.categories.get_mut(id)?;
            category.top_product_id = product_id;
            Ok(category.clone())
        })
    }

    #[instrument(skip(self), fields(operation = "delete_category"), err)]
    async fn delete_category(&self, id: CategoryId) -> StoreResult<()> {
        self.write(|t| {
            t.categories.get(id)?;
            let products = t.products.count_where(|p| p.category_id == id);
            protect(Product::CATEGORY_ON_DELETE, products, "category", "products")?;
            t.categories.remove(id).map(|_| ())
        })
    }

    async fn insert_discount(&self, new: NewDiscount) -> StoreResult<Discount> {
        new.validate()?;
        self.write(|t| {
            let discount = new.into_discount(t.discounts.allocate());
            t.discounts.insert(discount.clone());
            Ok(discount)
        })
    }

    async fn list_discounts(&self) -> StoreResult<Vec<Discount>> {
        self.read(|t| Ok(t.discounts.values().cloned().collect()))
    }

    async fn delete_discount(&self, id: DiscountId) -> StoreResult<()> {
        self.write(|t| {
            t.discounts.remove(id)?;
            for product in t.products.rows.values_mut() {
                product.discount_ids.retain(|d| *d != id);
            }
            Ok(())
        })
    }

    async fn insert_product(&self, new: NewProduct) -> StoreResult<Product> {
        new.validate()?;
        self.write(|t| {
            t.categories
                .get(new.category_id)
                .map_err(|_| StoreError::missing(format!("category {}", new.category_id)))?;
            t.require_discounts(&new.discount_ids)?;
            let slug = new.resolved_slug();
            if t.slug_taken(slug.as_str(), None) {
                return Err(StoreError::unique(format!("product slug '{slug}' already exists")));
            }
            let product = new.into_product(t.products.allocate(), Utc::now());
            t.products.insert(product.clone());
            Ok(product)
        })
    }

    async fn get_product(&self, id: ProductId) -> StoreResult<Product> {
        self.read(|t| t.products.get(id).cloned())
    }

    async fn fetch_products(
        &self,
        query: &ProductQuery,
        page: Option<Pagination>,
    ) -> StoreResult<(Vec<ProductRow>, u64)> {
        self.read(|t| {
            let mut rows = Vec::new();
            for product in t.products.values() {
                let category = t.categories.get(product.category_id)?;
                if query.matches(product, category) {
                    rows.push(ProductRow {
                        product: product.clone(),
                        category_title: category.title.clone(),
                    });
                }
            }
            let total = rows.len() as u64;
            let rows = match page {
                Some(page) => page.apply(rows),
                None => rows,
            };
            Ok((rows, total))
        })
    }

    async fn update_product_price(&self, id: ProductId, price: Price) -> StoreResult<Product> {
        self.write(|t| t.touch_product(id, |p| p.price = price))
    }

    async fn attach_discount(&self, id: ProductId, discount_id: DiscountId) -> StoreResult<Product> {
        self.write(|t| {
            t.products.get(id)?;
            t.require_discounts(&[discount_id])?;
            t.touch_product(id, |p| {
                if !p.has_discount(discount_id) {
                    p.discount_ids.push(discount_id);
                    p.discount_ids.sort();
                }
            })
        })
    }

    async fn detach_discount(&self, id: ProductId, discount_id: DiscountId) -> StoreResult<Product> {
        self.write(|t| t.touch_product(id, |p| p.discount_ids.retain(|d| *d != discount_id)))
    }

    #[instrument(skip(self, ids), fields(operation = "clear_inventory", requested = ids.len()), err)]
    async fn clear_inventory(&self, ids: &[ProductId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let wanted: HashSet<ProductId> = ids.iter().copied().collect();
        let updated = self.write(|t| {
            let mut updated = 0u64;
            for id in &wanted {
                if let Ok(product) = t.products.get_mut(*id) {
                    product.inventory = 0;
                    updated += 1;
                }
            }
            Ok(updated)
        })?;
        info!(updated, "inventory cleared");
        Ok(updated)
    }

    #[instrument(skip(self), fields(operation = "delete_product"), err)]
    async fn delete_product(&self, id: ProductId) -> StoreResult<()> {
        self.write(|t| {
            t.products.get(id)?;
            let ordered = t.order_items.count_where(|i| i.product_id == id);
            protect(OrderItem::PRODUCT_ON_DELETE, ordered, "product", "order items")?;
            let featured = t.categories.count_where(|c| c.top_product_id == Some(id));
            protect(Category::TOP_PRODUCT_ON_DELETE, featured, "product", "categories")?;

            cascade(Comment::PRODUCT_ON_DELETE, &mut t.comments, |c| c.product_id == id);
            cascade(CartItem::PRODUCT_ON_DELETE, &mut t.cart_items, |i| i.product_id == id);
            t.products.remove(id).map(|_| ())
        })
    }

    async fn comment_counts(&self, ids: &[ProductId]) -> StoreResult<HashMap<ProductId, u64>> {
        let wanted: HashSet<ProductId> = ids.iter().copied().collect();
        self.read(|t| {
            let mut counts = HashMap::new();
            for comment in t.comments.values().filter(|c| wanted.contains(&c.product_id)) {
                *counts.entry(comment.product_id).or_insert(0) += 1;
            }
            Ok(counts)
        })
    }

    async fn discounts_for(
        &self,
        ids: &[ProductId],
    ) -> StoreResult<HashMap<ProductId, Vec<Discount>>> {
        self.read(|t| {
            let mut out = HashMap::new();
            for id in ids {
                let Ok(product) = t.products.get(*id) else {
                    continue;
                };
                let discounts = product
                    .discount_ids
                    .iter()
                    .filter_map(|d| t.discounts.get(*d).ok().cloned())
                    .collect();
                out.insert(*id, discounts);
            }
            Ok(out)
        })
    }

    async fn insert_comment(&self, new: NewComment) -> StoreResult<Comment> {
        new.validate()?;
        self.write(|t| {
            t.require_product(new.product_id)?;
            let comment = new.into_comment(t.comments.allocate(), Utc::now());
            t.comments.insert(comment.clone());
            Ok(comment)
        })
    }

    async fn fetch_comments(
        &self,
        product_id: Option<ProductId>,
        page: Pagination,
    ) -> StoreResult<(Vec<Comment>, u64)> {
        self.read(|t| {
            let rows: Vec<Comment> = t
                .comments
                .values()
                .filter(|c| product_id.is_none_or(|p| c.product_id == p))
                .cloned()
                .collect();
            let total = rows.len() as u64;
            Ok((page.apply(rows), total))
        })
    }

    async fn update_comment_status(
        &self,
        id: CommentId,
        status: CommentStatus,
    ) -> StoreResult<Comment> {
        self.write(|t| {
            let comment = t.comments.get_mut(id)?;
            comment.status = status;
            Ok(comment.clone())
        })
    }

    async fn delete_comment(&self, id: CommentId) -> StoreResult<()> {
        self.write(|t| t.comments.remove(id).map(|_| ()))
    }

    async fn insert_customer(&self, new: NewCustomer) -> StoreResult<Customer> {
        new.validate()?;
        self.write(|t| {
            let customer = new.into_customer(t.customers.allocate());
            t.customers.insert(customer.clone());
            Ok(customer)
        })
    }

    async fn get_customer(&self, id: CustomerId) -> StoreResult<Customer> {
        self.read(|t| t.customers.get(id).cloned())
    }

    async fn fetch_customers(
        &self,
        search: Option<&str>,
        page: Pagination,
    ) -> StoreResult<(Vec<Customer>, u64)> {
        self.read(|t| {
            let mut rows: Vec<Customer> = t
                .customers
                .values()
                .filter(|c| search.is_none_or(|s| c.name_starts_with(s)))
                .cloned()
                .collect();
            rows.sort_by_cached_key(Customer::sort_key);
            let total = rows.len() as u64;
            Ok((page.apply(rows), total))
        })
    }

    async fn customers_by_id(
        &self,
        ids: &[CustomerId],
    ) -> StoreResult<HashMap<CustomerId, Customer>> {
        self.read(|t| {
            Ok(ids
                .iter()
                .filter_map(|id| t.customers.get(*id).ok().map(|c| (*id, c.clone())))
                .collect())
        })
    }

    #[instrument(skip(self), fields(operation = "delete_customer"), err)]
    async fn delete_customer(&self, id: CustomerId) -> StoreResult<()> {
        self.write(|t| {
            t.customers.get(id)?;
            let orders = t.orders.count_where(|o| o.customer_id == id);
            protect(Order::CUSTOMER_ON_DELETE, orders, "customer", "orders")?;
            if Address::CUSTOMER_ON_DELETE == OnDelete::Cascade {
                t.addresses.remove(&id);
            }
            t.customers.remove(id).map(|_| ())
        })
    }

    async fn upsert_address(
        &self,
        customer_id: CustomerId,
        new: NewAddress,
    ) -> StoreResult<Address> {
        new.validate()?;
        self.write(|t| {
            t.customers
                .get(customer_id)
                .map_err(|_| StoreError::missing(format!("customer {customer_id}")))?;
            let address = new.into_address(customer_id);
            t.addresses.insert(customer_id, address.clone());
            Ok(address)
        })
    }

    async fn get_address(&self, customer_id: CustomerId) -> StoreResult<Address> {
        self.read(|t| t.addresses.get(&customer_id).cloned().ok_or(StoreError::NotFound))
    }

    #[instrument(skip(self, new), fields(operation = "insert_order", items = new.items.len()), err)]
    async fn insert_order(&self, new: NewOrder) -> StoreResult<(Order, Vec<OrderItem>)> {
        new.validate()?;
        self.write(|t| {
            t.customers
                .get(new.customer_id)
                .map_err(|_| StoreError::missing(format!("customer {}", new.customer_id)))?;
            let mut seen = HashSet::new();
            for item in &new.items {
                t.require_product(item.product_id)?;
                if !seen.insert(item.product_id) {
                    return Err(StoreError::unique(format!(
                        "order already contains product {}",
                        item.product_id
                    )));
                }
            }

            let (order, new_items) = new.into_order(t.orders.allocate(), Utc::now());
            let mut items = Vec::with_capacity(new_items.len());
            for new_item in new_items {
                items.push(t.build_order_item(order.id, new_item)?);
            }
            t.orders.insert(order.clone());
            for item in &items {
                t.order_items.insert(item.clone());
            }
            Ok((order, items))
        })
    }

    async fn get_order(&self, id: OrderId) -> StoreResult<Order> {
        self.read(|t| t.orders.get(id).cloned())
    }

    async fn fetch_orders(&self, page: Pagination) -> StoreResult<(Vec<Order>, u64)> {
        self.read(|t| {
            let mut rows: Vec<Order> = t.orders.values().cloned().collect();
            rows.sort_by(Order::newest_first);
            let total = rows.len() as u64;
            Ok((page.apply(rows), total))
        })
    }

    async fn item_counts(&self, ids: &[OrderId]) -> StoreResult<HashMap<OrderId, u64>> {
        let wanted: HashSet<OrderId> = ids.iter().copied().collect();
        self.read(|t| {
            let mut counts = HashMap::new();
            for item in t.order_items.values().filter(|i| wanted.contains(&i.order_id)) {
                *counts.entry(item.order_id).or_insert(0) += 1;
            }
            Ok(counts)
        })
    }

    async fn items_for(&self, ids: &[OrderId]) -> StoreResult<HashMap<OrderId, Vec<OrderItem>>> {
        let wanted: HashSet<OrderId> = ids.iter().copied().collect();
        self.read(|t| {
            let mut out: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
            for item in t.order_items.values().filter(|i| wanted.contains(&i.order_id)) {
                out.entry(item.order_id).or_default().push(item.clone());
            }
            Ok(out)
        })
    }

    async fn fetch_order_items(&self, page: Pagination) -> StoreResult<(Vec<OrderItemRow>, u64)> {
        self.read(|t| {
            let total = t.order_items.rows.len() as u64;
            let mut rows = Vec::new();
            for item in page.apply(t.order_items.values().collect::<Vec<_>>()) {
                rows.push(OrderItemRow {
                    product_name: t.products.get(item.product_id)?.name.clone(),
                    item: item.clone(),
                });
            }
            Ok((rows, total))
        })
    }

    async fn add_order_item(&self, order_id: OrderId, new: NewOrderItem) -> StoreResult<OrderItem> {
        self.write(|t| {
            t.orders
                .get(order_id)
                .map_err(|_| StoreError::missing(format!("order {order_id}")))?;
            let product_id = new.product_id;
            if t.order_items
                .values()
                .any(|i| i.order_id == order_id && i.product_id == product_id)
            {
                return Err(StoreError::unique(format!(
                    "order {order_id} already contains product {product_id}"
                )));
            }
            let item = t.build_order_item(order_id, new)?;
            t.order_items.insert(item.clone());
            Ok(item)
        })
    }

    async fn update_order_status(&self, id: OrderId, status: OrderStatus) -> StoreResult<Order> {
        self.write(|t| {
            let order = t.orders.get_mut(id)?;
            order.status = status;
            Ok(order.clone())
        })
    }

    async fn delete_order_item(&self, id: OrderItemId) -> StoreResult<()> {
        self.write(|t| t.order_items.remove(id).map(|_| ()))
    }

    #[instrument(skip(self), fields(operation = "delete_order"), err)]
    async fn delete_order(&self, id: OrderId) -> StoreResult<()> {
        self.write(|t| {
            t.orders.get(id)?;
            let items = t.order_items.count_where(|i| i.order_id == id);
            protect(OrderItem::ORDER_ON_DELETE, items, "order", "order items")?;
            t.orders.remove(id).map(|_| ())
        })
    }

    async fn create_cart(&self) -> StoreResult<Cart> {
        self.write(|t| {
            let cart = Cart::open(Utc::now());
            t.carts.insert(cart.id, cart.clone());
            Ok(cart)
        })
    }

    async fn get_cart(&self, id: CartId) -> StoreResult<Cart> {
        self.read(|t| t.carts.get(&id).cloned().ok_or(StoreError::NotFound))
    }

    async fn cart_items(&self, id: CartId) -> StoreResult<Vec<CartItem>> {
        self.read(|t| {
            if !t.carts.contains_key(&id) {
                return Err(StoreError::NotFound);
            }
            Ok(t.cart_items.values().filter(|i| i.cart_id == id).cloned().collect())
        })
    }

    async fn add_cart_item(&self, cart_id: CartId, new: NewCartItem) -> StoreResult<CartItem> {
        self.write(|t| {
            if !t.carts.contains_key(&cart_id) {
                return Err(StoreError::missing(format!("cart {cart_id}")));
            }
            t.require_product(new.product_id)?;
            if t.cart_items
                .values()
                .any(|i| i.cart_id == cart_id && i.product_id == new.product_id)
            {
                return Err(StoreError::unique(format!(
                    "cart already contains product {}",
                    new.product_id
                )));
            }
            let item = new.into_item(t.cart_items.allocate(), cart_id);
            t.cart_items.insert(item.clone());
            Ok(item)
        })
    }

    async fn delete_cart_item(&self, id: CartItemId) -> StoreResult<()> {
        self.write(|t| t.cart_items.remove(id).map(|_| ()))
    }

    async fn delete_cart(&self, id: CartId) -> StoreResult<()> {
        self.write(|t| {
            t.carts.remove(&id).ok_or(StoreError::NotFound)?;
            cascade(CartItem::CART_ON_DELETE, &mut t.cart_items, |i| i.cart_id == id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_catalog::Slug;
    use store_customers::Email;
    use store_sales::Quantity;

    fn price(s: &str) -> Price {
        s.parse().unwrap()
    }

    fn qty(n: i64) -> Quantity {
        Quantity::new(n).unwrap()
    }

    async fn category(store: &InMemoryShopStore, title: &str) -> Category {
        store.insert_category(NewCategory::new(title)).await.unwrap()
    }

    async fn product(store: &InMemoryShopStore, category: CategoryId, name: &str, inventory: u32) -> Product {
        store
            .insert_product(NewProduct::new(name, category, price("10.00"), inventory))
            .await
            .unwrap()
    }

    async fn customer(store: &InMemoryShopStore, first: &str, last: &str) -> Customer {
        store
            .insert_customer(NewCustomer {
                first_name: first.into(),
                last_name: last.into(),
                email: Email::parse(format!("{}@example.com", first.to_lowercase())).unwrap(),
                phone_number: "555-0100".into(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn ids_are_assigned_sequentially_per_table() {
        let store = InMemoryShopStore::new();
        let a = category(&store, "A").await;
        let b = category(&store, "B").await;
        assert_eq!(a.id, CategoryId::new(1));
        assert_eq!(b.id, CategoryId::new(2));

        let p = product(&store, a.id, "Mug", 1).await;
        assert_eq!(p.id, ProductId::new(1));
    }

    #[tokio::test]
    async fn validation_runs_before_any_write() {
        let store = InMemoryShopStore::new();
        let err = store.insert_category(NewCategory::new(" ")).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(_)));
        assert!(store.list_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn product_requires_existing_category_and_discounts() {
        let store = InMemoryShopStore::new();
        let err = store
            .insert_product(NewProduct::new("Mug", CategoryId::new(9), Price::zero(), 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));

        let c = category(&store, "Kitchen").await;
        let err = store
            .insert_product(
                NewProduct::new("Mug", c.id, Price::zero(), 1).with_discounts(vec![DiscountId::new(4)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));
    }

    #[tokio::test]
    async fn duplicate_slug_is_a_unique_violation() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        product(&store, c.id, "Blue Mug", 1).await;

        let err = store
            .insert_product(
                NewProduct::new("Other", c.id, Price::zero(), 1).with_slug(Slug::parse("blue-mug").unwrap()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn deleting_category_with_products_is_protected() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;

        let err = store.delete_category(c.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));
        assert!(store.get_category(c.id).await.is_ok());

        store.delete_product(p.id).await.unwrap();
        store.delete_category(c.id).await.unwrap();
        assert!(matches!(store.get_category(c.id).await, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn featured_product_cannot_be_deleted() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;
        store.set_top_product(c.id, Some(p.id)).await.unwrap();

        let err = store.delete_product(p.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));

        store.set_top_product(c.id, None).await.unwrap();
        store.delete_product(p.id).await.unwrap();
    }

    #[tokio::test]
    async fn deleting_customer_cascades_address_but_orders_protect() {
        let store = InMemoryShopStore::new();
        let ada = customer(&store, "Ada", "Lovelace").await;
        store
            .upsert_address(
                ada.id,
                NewAddress {
                    province: "P".into(),
                    city: "C".into(),
                    street: "S".into(),
                },
            )
            .await
            .unwrap();

        store.delete_customer(ada.id).await.unwrap();
        assert!(matches!(store.get_address(ada.id).await, Err(StoreError::NotFound)));

        let bob = customer(&store, "Bob", "Builder").await;
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;
        store
            .insert_order(NewOrder {
                customer_id: bob.id,
                status: OrderStatus::Unpaid,
                items: vec![NewOrderItem::new(p.id, qty(1))],
            })
            .await
            .unwrap();
        let err = store.delete_customer(bob.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));
    }

    #[tokio::test]
    async fn address_upsert_replaces_existing() {
        let store = InMemoryShopStore::new();
        let ada = customer(&store, "Ada", "Lovelace").await;
        let addr = |street: &str| NewAddress {
            province: "P".into(),
            city: "C".into(),
            street: street.into(),
        };
        store.upsert_address(ada.id, addr("First")).await.unwrap();
        store.upsert_address(ada.id, addr("Second")).await.unwrap();
        assert_eq!(store.get_address(ada.id).await.unwrap().street, "Second");

        let err = store.upsert_address(CustomerId::new(99), addr("X")).await.unwrap_err();
        assert!(matches!(err, StoreError::MissingReference(_)));
    }

    #[tokio::test]
    async fn duplicate_order_item_is_a_unique_violation() {
        let store = InMemoryShopStore::new();
        let ada = customer(&store, "Ada", "Lovelace").await;
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;

        let err = store
            .insert_order(NewOrder {
                customer_id: ada.id,
                status: OrderStatus::Unpaid,
                items: vec![NewOrderItem::new(p.id, qty(1)), NewOrderItem::new(p.id, qty(2))],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
        assert_eq!(store.fetch_orders(Pagination::default()).await.unwrap().1, 0);

        let (order, _) = store
            .insert_order(NewOrder {
                customer_id: ada.id,
                status: OrderStatus::Unpaid,
                items: vec![NewOrderItem::new(p.id, qty(1))],
            })
            .await
            .unwrap();
        let err = store
            .add_order_item(order.id, NewOrderItem::new(p.id, qty(5)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));
    }

    #[tokio::test]
    async fn order_items_capture_price_and_protect_order() {
        let store = InMemoryShopStore::new();
        let ada = customer(&store, "Ada", "Lovelace").await;
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;

        let (order, items) = store
            .insert_order(NewOrder {
                customer_id: ada.id,
                status: OrderStatus::Unpaid,
                items: vec![NewOrderItem::new(p.id, qty(3))],
            })
            .await
            .unwrap();
        assert_eq!(items[0].price, price("10.00"));

        store.update_product_price(p.id, price("12.50")).await.unwrap();
        let stored = store.items_for(&[order.id]).await.unwrap();
        assert_eq!(stored[&order.id][0].price, price("10.00"));

        let err = store.delete_order(order.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));
        let err = store.delete_product(p.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Protected { .. }));

        store.delete_order_item(items[0].id).await.unwrap();
        store.delete_order(order.id).await.unwrap();
    }

    #[tokio::test]
    async fn statuses_move_freely_in_any_direction() {
        let store = InMemoryShopStore::new();
        let ada = customer(&store, "Ada", "Lovelace").await;
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;
        let (order, _) = store
            .insert_order(NewOrder {
                customer_id: ada.id,
                status: OrderStatus::Cancelled,
                items: vec![NewOrderItem::new(p.id, qty(1))],
            })
            .await
            .unwrap();

        let paid = store.update_order_status(order.id, OrderStatus::Paid).await.unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        let unpaid = store.update_order_status(order.id, OrderStatus::Unpaid).await.unwrap();
        assert_eq!(unpaid.status, OrderStatus::Unpaid);

        let comment = store
            .insert_comment(NewComment {
                product_id: p.id,
                name: "Ada".into(),
                body: "Nice".into(),
                status: CommentStatus::Rejected,
            })
            .await
            .unwrap();
        let approved = store
            .update_comment_status(comment.id, CommentStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.status, CommentStatus::Approved);

        let err = store
            .update_order_status(OrderId::new(99), OrderStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn clear_inventory_counts_only_existing_rows() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let a = product(&store, c.id, "A", 5).await;
        let b = product(&store, c.id, "B", 7).await;
        let untouched = product(&store, c.id, "C", 9).await;

        assert_eq!(store.clear_inventory(&[]).await.unwrap(), 0);
        assert_eq!(store.get_product(a.id).await.unwrap().inventory, 5);

        let n = store
            .clear_inventory(&[a.id, b.id, ProductId::new(404)])
            .await
            .unwrap();
        assert_eq!(n, 2);
        assert_eq!(store.get_product(a.id).await.unwrap().inventory, 0);
        assert_eq!(store.get_product(b.id).await.unwrap().inventory, 0);
        assert_eq!(store.get_product(untouched.id).await.unwrap().inventory, 9);
    }

    #[tokio::test]
    async fn price_edit_refreshes_modified_timestamp() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;

        let edited = store.update_product_price(p.id, price("3.00")).await.unwrap();
        assert_eq!(edited.price, price("3.00"));
        assert_eq!(edited.created_at, p.created_at);
        assert!(edited.modified_at >= p.modified_at);
    }

    #[tokio::test]
    async fn deleting_product_cascades_comments_and_cart_items() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;
        store
            .insert_comment(NewComment {
                product_id: p.id,
                name: "Ada".into(),
                body: "Nice".into(),
                status: CommentStatus::Pending,
            })
            .await
            .unwrap();
        let cart = store.create_cart().await.unwrap();
        store
            .add_cart_item(cart.id, NewCartItem { product_id: p.id, quantity: qty(1) })
            .await
            .unwrap();

        store.delete_product(p.id).await.unwrap();
        let (comments, total) = store.fetch_comments(None, Pagination::default()).await.unwrap();
        assert!(comments.is_empty());
        assert_eq!(total, 0);
        assert!(store.cart_items(cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cart_items_are_unique_per_product_and_cascade_with_cart() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let p = product(&store, c.id, "Mug", 1).await;
        let cart = store.create_cart().await.unwrap();

        store
            .add_cart_item(cart.id, NewCartItem { product_id: p.id, quantity: qty(1) })
            .await
            .unwrap();
        let err = store
            .add_cart_item(cart.id, NewCartItem { product_id: p.id, quantity: qty(2) })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UniqueViolation(_)));

        store.delete_cart(cart.id).await.unwrap();
        assert!(matches!(store.cart_items(cart.id).await, Err(StoreError::NotFound)));
        // The product survives its cart.
        assert!(store.get_product(p.id).await.is_ok());
    }

    #[tokio::test]
    async fn deleting_discount_unlinks_products() {
        let store = InMemoryShopStore::new();
        let c = category(&store, "Kitchen").await;
        let d = store
            .insert_discount(NewDiscount { discount: 10.0, description: "Sale".into() })
            .await
            .unwrap();
        let p = product(&store, c.id, "Mug", 1).await;
        let p = store.attach_discount(p.id, d.id).await.unwrap();
        assert!(p.has_discount(d.id));

        store.delete_discount(d.id).await.unwrap();
        assert!(store.get_product(p.id).await.unwrap().discount_ids.is_empty());
    }

    #[tokio::test]
    async fn customers_sort_by_first_then_last_name() {
        let store = InMemoryShopStore::new();
        customer(&store, "Bob", "Zed").await;
        customer(&store, "Ada", "Young").await;
        customer(&store, "Bob", "Adams").await;

        let (rows, total) = store.fetch_customers(None, Pagination::default()).await.unwrap();
        let names: Vec<String> = rows.iter().map(|c| c.to_string()).collect();
        assert_eq!(total, 3);
        assert_eq!(names, vec!["Ada Young", "Bob Adams", "Bob Zed"]);

        customer(&store, "alice", "Brown").await;
        let (rows, _) = store.fetch_customers(None, Pagination::default()).await.unwrap();
        let names: Vec<String> = rows.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["Ada Young", "alice Brown", "Bob Adams", "Bob Zed"]);

        let (rows, _) = store
            .fetch_customers(Some("ad"), Pagination::default())
            .await
            .unwrap();
        let names: Vec<String> = rows.iter().map(|c| c.to_string()).collect();
        assert_eq!(names, vec!["Ada Young", "Bob Adams"]);
    }
}
