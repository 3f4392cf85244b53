// Herald
// Copyright (C) 2025 Throneless Tech

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

pub use super::auth_setting::Entity as AuthSetting;
pub use super::chat_entity::Entity as ChatEntity;
pub use super::cooldown::Entity as Cooldown;
pub use super::seen_item::Entity as SeenItem;
pub use super::subscription::Entity as Subscription;
pub use super::subscription_source::Entity as SubscriptionSource;
